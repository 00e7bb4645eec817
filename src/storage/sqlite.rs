use crate::models::{Dataset, GaReferralStat, GaStat, GaUrl, Publisher, Resource, UrlQuery};
use crate::period::ALL;
use crate::storage::{
    PeriodSummary, ReferralRecord, StatQuery, StatRecord, Storage, StorageResult, UrlRecord,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

const URL_COLUMNS: &str =
    "id, url, period_name, period_complete_day, pageviews, visits, department_id, package_id";
const STAT_COLUMNS: &str = "id, stat_name, key, value, period_name, period_complete_day";

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ga_url (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                period_name TEXT NOT NULL,
                period_complete_day INTEGER NOT NULL DEFAULT 0,
                pageviews INTEGER NOT NULL DEFAULT 0,
                visits INTEGER NOT NULL DEFAULT 0,
                department_id TEXT NOT NULL DEFAULT '',
                package_id TEXT NOT NULL DEFAULT '',
                UNIQUE (url, period_name)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ga_url_period ON ga_url(period_name)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ga_url_department ON ga_url(department_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ga_stat (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stat_name TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                period_name TEXT NOT NULL,
                period_complete_day INTEGER NOT NULL DEFAULT 0,
                UNIQUE (stat_name, key, period_name)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ga_referrer (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                source TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                period_name TEXT NOT NULL,
                UNIQUE (url, source, period_name)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portal_publisher (
                name TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                state TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portal_dataset (
                name TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                publisher_name TEXT NOT NULL DEFAULT '',
                state TEXT NOT NULL,
                private INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portal_resource (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                dataset_name TEXT NOT NULL,
                format TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_portal_resource_url ON portal_resource(url)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_portal_resource_dataset ON portal_resource(dataset_name)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn upsert_url(&self, record: &UrlRecord) -> StorageResult<()> {
        record.validate()?;

        sqlx::query(
            r#"
            INSERT INTO ga_url (url, period_name, period_complete_day, pageviews, visits, department_id, package_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (url, period_name) DO UPDATE SET
                period_complete_day = excluded.period_complete_day,
                pageviews = excluded.pageviews,
                visits = excluded.visits,
                department_id = excluded.department_id,
                package_id = excluded.package_id
            "#,
        )
        .bind(&record.url)
        .bind(&record.period_name)
        .bind(record.period_complete_day)
        .bind(record.pageviews)
        .bind(record.visits)
        .bind(&record.department_id)
        .bind(&record.package_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_urls(&self, query: &UrlQuery) -> Result<Vec<GaUrl>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {URL_COLUMNS} FROM ga_url WHERE 1 = 1"));

        if let Some(period) = &query.period_name {
            qb.push(" AND period_name = ").push_bind(period.clone());
        }
        if query.exclude_all {
            qb.push(" AND period_name <> ").push_bind(ALL);
        }
        if let Some(url) = &query.exact_url {
            qb.push(" AND url = ").push_bind(url.clone());
        }
        if let Some(fragment) = &query.url_contains {
            qb.push(" AND instr(url, ").push_bind(fragment.clone()).push(") > 0");
        }
        if let Some(department) = &query.department_id {
            qb.push(" AND department_id = ").push_bind(department.clone());
        }
        if query.with_package {
            qb.push(" AND package_id <> ''");
        }
        if let Some(ids) = &query.package_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            qb.push(" AND package_id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");
        }
        qb.push(" ORDER BY pageviews DESC, url ASC, period_name ASC");

        let rows = qb
            .build_query_as::<GaUrl>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows)
    }

    async fn urls_with_monthly_rows(&self) -> Result<Vec<String>> {
        let urls = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT url FROM ga_url
            WHERE period_name <> ?
            ORDER BY url
            "#,
        )
        .bind(ALL)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(urls)
    }

    async fn delete_url_row(&self, url: &str, period_name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ga_url WHERE url = ? AND period_name = ?")
            .bind(url)
            .bind(period_name)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_stat(&self, record: &StatRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ga_stat (stat_name, key, value, period_name, period_complete_day)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (stat_name, key, period_name) DO UPDATE SET
                value = excluded.value,
                period_complete_day = excluded.period_complete_day
            "#,
        )
        .bind(&record.stat_name)
        .bind(&record.key)
        .bind(&record.value)
        .bind(&record.period_name)
        .bind(record.period_complete_day)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_stats(&self, query: &StatQuery) -> Result<Vec<GaStat>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {STAT_COLUMNS} FROM ga_stat WHERE 1 = 1"));

        if let Some(name) = &query.stat_name {
            qb.push(" AND stat_name = ").push_bind(name.clone());
        }
        if let Some(name) = &query.exclude_stat_name {
            qb.push(" AND stat_name <> ").push_bind(name.clone());
        }
        if let Some(key) = &query.key {
            qb.push(" AND key = ").push_bind(key.clone());
        }
        if let Some(period) = &query.period_name {
            qb.push(" AND period_name = ").push_bind(period.clone());
        }
        qb.push(" ORDER BY period_name, stat_name, key");

        let rows = qb
            .build_query_as::<GaStat>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows)
    }

    async fn upsert_referral(&self, record: &ReferralRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ga_referrer (url, source, count, period_name)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (url, source, period_name) DO UPDATE SET
                count = excluded.count
            "#,
        )
        .bind(&record.url)
        .bind(&record.source)
        .bind(record.count)
        .bind(&record.period_name)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_referrals(&self, period_name: Option<&str>) -> Result<Vec<GaReferralStat>> {
        let rows = match period_name {
            Some(period) => {
                sqlx::query_as::<_, GaReferralStat>(
                    r#"
                    SELECT id, url, source, count, period_name
                    FROM ga_referrer
                    WHERE period_name = ?
                    ORDER BY count DESC, url ASC
                    "#,
                )
                .bind(period)
                .fetch_all(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query_as::<_, GaReferralStat>(
                    r#"
                    SELECT id, url, source, count, period_name
                    FROM ga_referrer
                    ORDER BY count DESC, url ASC
                    "#,
                )
                .fetch_all(self.pool.as_ref())
                .await?
            }
        };

        Ok(rows)
    }

    async fn url_periods(&self) -> Result<Vec<PeriodSummary>> {
        let periods = sqlx::query_as::<_, PeriodSummary>(
            r#"
            SELECT period_name, MAX(period_complete_day) AS period_complete_day
            FROM ga_url
            WHERE period_name <> ?
            GROUP BY period_name
            ORDER BY period_name DESC
            "#,
        )
        .bind(ALL)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(periods)
    }

    async fn stat_periods(&self, stat_name: Option<&str>) -> Result<Vec<PeriodSummary>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT period_name, MAX(period_complete_day) AS period_complete_day FROM ga_stat WHERE period_name <> ",
        );
        qb.push_bind(ALL);
        if let Some(name) = stat_name {
            qb.push(" AND stat_name = ").push_bind(name.to_string());
        }
        qb.push(" GROUP BY period_name ORDER BY period_name DESC");

        let periods = qb
            .build_query_as::<PeriodSummary>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(periods)
    }

    async fn delete_period(&self, period_name: &str) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let urls = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT url FROM ga_url WHERE period_name = ? ORDER BY url",
        )
        .bind(period_name)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM ga_url WHERE period_name = ?")
            .bind(period_name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM ga_stat WHERE period_name = ?")
            .bind(period_name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM ga_referrer WHERE period_name = ?")
            .bind(period_name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(urls)
    }

    async fn upsert_publisher(&self, publisher: &Publisher) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO portal_publisher (name, title, state)
            VALUES (?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                title = excluded.title,
                state = excluded.state
            "#,
        )
        .bind(&publisher.name)
        .bind(&publisher.title)
        .bind(&publisher.state)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn get_publisher(&self, name: &str) -> Result<Option<Publisher>> {
        let publisher = sqlx::query_as::<_, Publisher>(
            "SELECT name, title, state FROM portal_publisher WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(publisher)
    }

    async fn list_publishers(&self) -> Result<Vec<Publisher>> {
        let publishers = sqlx::query_as::<_, Publisher>(
            "SELECT name, title, state FROM portal_publisher ORDER BY name",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(publishers)
    }

    async fn upsert_dataset(&self, dataset: &Dataset) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO portal_dataset (name, title, publisher_name, state, private)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                title = excluded.title,
                publisher_name = excluded.publisher_name,
                state = excluded.state,
                private = excluded.private
            "#,
        )
        .bind(&dataset.name)
        .bind(&dataset.title)
        .bind(&dataset.publisher_name)
        .bind(&dataset.state)
        .bind(dataset.private)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn get_dataset(&self, name: &str) -> Result<Option<Dataset>> {
        let dataset = sqlx::query_as::<_, Dataset>(
            "SELECT name, title, publisher_name, state, private FROM portal_dataset WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(dataset)
    }

    async fn first_listed_dataset(&self) -> Result<Option<Dataset>> {
        let dataset = sqlx::query_as::<_, Dataset>(
            r#"
            SELECT name, title, publisher_name, state, private
            FROM portal_dataset
            WHERE state = 'active' AND private = 0
            ORDER BY name
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(dataset)
    }

    async fn replace_resources(&self, dataset_name: &str, resources: &[Resource]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM portal_resource WHERE dataset_name = ?")
            .bind(dataset_name)
            .execute(&mut *tx)
            .await?;

        for resource in resources {
            sqlx::query("INSERT INTO portal_resource (url, dataset_name, format) VALUES (?, ?, ?)")
                .bind(&resource.url)
                .bind(dataset_name)
                .bind(&resource.format)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_resource(&self, url: &str) -> Result<Option<Resource>> {
        let resource = sqlx::query_as::<_, Resource>(
            "SELECT url, dataset_name, format FROM portal_resource WHERE url = ? ORDER BY id LIMIT 1",
        )
        .bind(url)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(resource)
    }

    async fn dataset_resources(&self, dataset_name: &str) -> Result<Vec<Resource>> {
        let resources = sqlx::query_as::<_, Resource>(
            "SELECT url, dataset_name, format FROM portal_resource WHERE dataset_name = ? ORDER BY id",
        )
        .bind(dataset_name)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(resources)
    }
}
