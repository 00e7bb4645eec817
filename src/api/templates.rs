//! HTML pages for the site usage reports.

use crate::period::Period;
use crate::report::format::html_escape;
use crate::report::{
    Breakdown, DatasetsReport, GraphSeries, MonthDetails, PublishersReport, Referral,
    SiteUsageReport,
};

pub fn base_template(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Site Usage</title>
    <link rel="stylesheet" href="/assets/ga_report.css">
</head>
<body>
    <header>
        <nav>
            <a href="/site-usage">Site-wide</a>
            <a href="/site-usage/publisher">Publishers</a>
            <a href="/site-usage/dataset">Datasets</a>
        </nav>
    </header>
    <main>
        <h1>{title}</h1>
        {content}
    </main>
    <script src="/assets/ga_report.js"></script>
</body>
</html>"#,
        title = html_escape(title),
        content = content,
    )
}

/// `<select>` over the months with data, plus "All months".
fn month_selector(details: &MonthDetails, month: &Period, action: &str, publisher: Option<&str>) -> String {
    let selected = month.name();
    let mut options = format!(
        r#"<option value=""{}>All months</option>"#,
        if month.is_all() { " selected" } else { "" }
    );
    for m in &details.months {
        options.push_str(&format!(
            r#"<option value="{value}"{sel}>{title}</option>"#,
            value = html_escape(&m.period_name),
            sel = if m.period_name == selected { " selected" } else { "" },
            title = html_escape(&details.option_title(&m.period_name)),
        ));
    }

    let hidden = publisher
        .map(|p| format!(r#"<input type="hidden" name="publisher" value="{}">"#, html_escape(p)))
        .unwrap_or_default();

    format!(
        r#"<form class="month-selector" method="get" action="{action}">
            {hidden}
            <label>Month <select name="month" onchange="this.form.submit()">{options}</select></label>
        </form>"#,
        action = html_escape(action),
    )
}

/// Graph data for the client-side renderer.
fn graph_block(id: &str, series: &[GraphSeries]) -> String {
    if series.is_empty() {
        return String::new();
    }
    let json = serde_json::to_string(series)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/");
    format!(
        r#"<div class="graph" id="graph-{id}"></div>
        <script type="application/json" data-graph="graph-{id}">{json}</script>"#
    )
}

fn csv_link(href: &str) -> String {
    format!(r#"<a class="csv" href="{}">Download as CSV</a>"#, html_escape(href))
}

fn month_param(month: &Period) -> String {
    if month.is_all() {
        "all".to_string()
    } else {
        month.name()
    }
}

pub fn site_usage_page(report: &SiteUsageReport) -> String {
    let mut content = month_selector(&report.details, &report.month, "/site-usage", None);

    content.push_str(&format!(
        "<h2>Totals for {}</h2>",
        html_escape(&report.month_desc)
    ));
    content.push_str(r#"<table class="totals"><tbody>"#);
    for row in &report.totals {
        let tooltips: Vec<&str> = row.sparkline.iter().map(|p| p.tooltip.as_str()).collect();
        let values: Vec<&str> = row.sparkline.iter().map(|p| p.value.as_str()).collect();
        content.push_str(&format!(
            r#"<tr><th>{key}</th><td>{value}</td><td><span class="sparkline" data-values="{values}" data-tooltips="{tooltips}"></span></td></tr>"#,
            key = html_escape(&row.key),
            value = html_escape(&row.value),
            values = html_escape(&values.join(",")),
            tooltips = html_escape(&tooltips.join("|")),
        ));
    }
    content.push_str("</tbody></table>");

    for breakdown in &report.breakdowns {
        content.push_str(&breakdown_section(breakdown));
    }

    content.push_str(&referral_table("Social referrals", &report.referrers, true));
    content.push_str(&referral_table("Social referral totals", &report.referrer_totals, false));

    content.push_str(&csv_link(&format!("/site-usage_{}.csv", month_param(&report.month))));

    base_template("Site usage", &content)
}

fn breakdown_section(breakdown: &Breakdown) -> String {
    let mut rows = String::new();
    for (key, share) in &breakdown.rows {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            html_escape(key),
            html_escape(share)
        ));
    }
    if rows.is_empty() {
        rows.push_str(r#"<tr><td colspan="2">No data</td></tr>"#);
    }

    format!(
        r#"<section id="{slug}">
            <h2>{title}</h2>
            {graph}
            <table><thead><tr><th>Name</th><th>% visits</th></tr></thead><tbody>{rows}</tbody></table>
        </section>"#,
        slug = breakdown.slug,
        title = html_escape(breakdown.stat),
        graph = graph_block(breakdown.slug, &breakdown.graph),
    )
}

fn referral_table(title: &str, referrals: &[Referral], with_source: bool) -> String {
    let mut rows = String::new();
    for r in referrals {
        let source = if with_source {
            format!("<td>{}</td>", html_escape(&r.source))
        } else {
            String::new()
        };
        rows.push_str(&format!(
            r#"<tr><td><a href="{href}">{short}</a></td>{source}<td>{count}</td></tr>"#,
            href = html_escape(&r.full_url),
            short = html_escape(&r.short_url),
            count = r.count,
        ));
    }
    let source_header = if with_source { "<th>Source</th>" } else { "" };
    format!(
        r#"<section>
            <h2>{title}</h2>
            <table><thead><tr><th>Url</th>{source_header}<th>Visits</th></tr></thead><tbody>{rows}</tbody></table>
        </section>"#,
        title = html_escape(title),
    )
}

pub fn publishers_page(report: &PublishersReport) -> String {
    let mut content = month_selector(&report.details, &report.month, "/site-usage/publisher", None);

    content.push_str(&graph_block("publishers", &report.graph));

    let mut rows = String::new();
    for row in &report.top {
        rows.push_str(&format!(
            r#"<tr><td><a href="/site-usage/dataset/{name}?month={month}">{title}</a></td><td>{views}</td><td>{visits}</td></tr>"#,
            name = html_escape(&row.publisher.name),
            month = html_escape(&month_query(&report.month)),
            title = html_escape(&row.publisher.title),
            views = row.views,
            visits = row.visits,
        ));
    }
    content.push_str(&format!(
        r#"<h2>Top publishers for {desc}</h2>
        <table><thead><tr><th>Publisher</th><th>Dataset views</th><th>Dataset visits</th></tr></thead><tbody>{rows}</tbody></table>"#,
        desc = html_escape(&report.month_desc),
    ));

    content.push_str(&csv_link(&format!(
        "/site-usage/publishers_{}.csv",
        month_param(&report.month)
    )));

    base_template("Publishers", &content)
}

pub fn datasets_page(report: &DatasetsReport) -> String {
    let publisher_name = report.publisher.as_ref().map(|p| p.name.as_str());
    let mut content = month_selector(&report.details, &report.month, "/site-usage/dataset", publisher_name);

    let mut options = String::from(r#"<option value="all">All publishers</option>"#);
    for p in &report.publishers {
        options.push_str(&format!(
            r#"<option value="{name}"{sel}>{title}</option>"#,
            name = html_escape(&p.name),
            sel = if Some(p.name.as_str()) == publisher_name { " selected" } else { "" },
            title = html_escape(&p.title),
        ));
    }
    content.push_str(&format!(
        r#"<form class="publisher-selector" method="get" action="/site-usage/dataset">
            <input type="hidden" name="month" value="{month}">
            <label>Publisher <select name="publisher" onchange="this.form.submit()">{options}</select></label>
        </form>"#,
        month = html_escape(&month_query(&report.month)),
    ));

    if let Some(p) = &report.publisher {
        content.push_str(&format!(
            r#"<p class="publisher-views">{title} page views: {views}</p>"#,
            title = html_escape(&p.title),
            views = report.publisher_page_views,
        ));
    }

    content.push_str(&graph_block("datasets", &report.graph));

    let mut rows = String::new();
    for row in &report.top {
        rows.push_str(&format!(
            r#"<tr><td><a href="/dataset/{name}">{title}</a></td><td>{views}</td><td>{visits}</td><td>{downloads}</td><td>{formats}</td></tr>"#,
            name = html_escape(&row.dataset.name),
            title = html_escape(&row.dataset.title),
            views = row.views,
            visits = row.visits,
            downloads = row.downloads,
            formats = html_escape(&row.formats.join(", ")),
        ));
    }
    content.push_str(&format!(
        r#"<h2>Top datasets for {desc}</h2>
        <table><thead><tr><th>Dataset</th><th>Views</th><th>Visits</th><th>Resource downloads</th><th>Formats</th></tr></thead><tbody>{rows}</tbody></table>"#,
        desc = html_escape(&report.month_desc),
    ));

    content.push_str(&csv_link(&format!(
        "/site-usage/dataset/datasets_{}_{}.csv",
        publisher_name.unwrap_or("all"),
        month_param(&report.month)
    )));

    let title = match &report.publisher {
        Some(p) => format!("Datasets for {}", p.title),
        None => "Datasets".to_string(),
    };
    base_template(&title, &content)
}

fn month_query(month: &Period) -> String {
    if month.is_all() {
        String::new()
    } else {
        month.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_template_escapes_title() {
        let html = base_template("<b>", "<p>body</p>");
        assert!(html.contains("<title>&lt;b&gt; - Site Usage</title>"));
        assert!(html.contains("<p>body</p>"));
    }

    #[test]
    fn graph_json_cannot_close_script() {
        let mut series = GraphSeries::new("</script>");
        series.data.push(crate::report::GraphPoint { x: 1, y: 2.0 });
        let block = graph_block("x", &[series]);
        assert!(!block.contains("</script><"));
        assert!(block.contains("<\\/script>"));
    }
}
