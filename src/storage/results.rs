//! The result store: one row per finished job.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::filter::ResultFilter;
use super::{Pool, StoreConfig};

const COLUMNS: &str = "id, application, success, output, created";

/// Newest first; `seq` breaks ties between rows created in the same microsecond.
const ORDER: &str = "ORDER BY created DESC, seq DESC";

/// The stored outcome of one job execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub id: String,
    pub application: String,
    pub success: bool,
    pub output: String,
    pub created: DateTime<Utc>,
}

/// Caller-supplied part of a result; `id` and `created` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperationResult {
    pub application: String,
    pub success: bool,
    pub output: String,
}

/// One page of a filtered listing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PagedResults {
    /// Matches of the whole filtered set, independent of paging.
    pub total_count: i64,
    pub items: Vec<OperationResult>,
}

/// Repository of [`OperationResult`] records.
pub trait ResultStore: Send + Sync {
    /// Assign a fresh id and timestamp and persist the record.
    fn create(&self, item: NewOperationResult) -> StoreResult<OperationResult>;

    fn get_by_id(&self, id: &str) -> StoreResult<OperationResult>;

    /// Every record, newest first. Unpaged.
    fn get_all(&self) -> StoreResult<Vec<OperationResult>>;

    /// Up to `page_size` records matching all given filters, newest first,
    /// after skipping `skip` matches. `from`/`until` are inclusive exact
    /// bounds on `created`; an empty `application` means any.
    fn get_paged_items(
        &self,
        page_size: i64,
        skip: i64,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        application: &str,
    ) -> StoreResult<PagedResults>;

    /// Distinct application names, ascending.
    fn get_avail_apps(&self) -> StoreResult<Vec<String>>;
}

/// [`ResultStore`] backed by a pooled SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool,
    max_output_bytes: usize,
}

impl SqliteStore {
    /// Open the database file named in `config`, bootstrapping the schema.
    pub fn open(config: &StoreConfig) -> anyhow::Result<Self> {
        let pool = super::open_pool(config)?;
        Ok(Self::with_pool(pool, config))
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let pool = super::open_memory_pool()?;
        Ok(Self::with_pool(pool, &StoreConfig::default()))
    }

    /// Wrap an already migrated pool.
    pub fn with_pool(pool: Pool, config: &StoreConfig) -> Self {
        Self {
            pool,
            max_output_bytes: config.max_output_bytes,
        }
    }
}

fn row_to_result(row: &Row<'_>) -> rusqlite::Result<OperationResult> {
    let micros: i64 = row.get(4)?;
    let created = DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, micros))?;

    Ok(OperationResult {
        id: row.get(0)?,
        application: row.get(1)?,
        success: row.get(2)?,
        output: row.get(3)?,
        created,
    })
}

impl ResultStore for SqliteStore {
    fn create(&self, item: NewOperationResult) -> StoreResult<OperationResult> {
        const OP: &str = "create";

        if item.application.is_empty() {
            return Err(StoreError::invalid(OP, "application must not be empty"));
        }
        if item.output.len() > self.max_output_bytes {
            return Err(StoreError::invalid(
                OP,
                format!(
                    "output is {} bytes, limit is {}",
                    item.output.len(),
                    self.max_output_bytes
                ),
            ));
        }

        let result = OperationResult {
            id: Uuid::new_v4().to_string(),
            application: item.application,
            success: item.success,
            output: item.output,
            // stored with microsecond precision
            created: Utc::now().trunc_subsecs(6),
        };

        let conn = self.pool.get().map_err(StoreError::storage(OP))?;
        conn.execute(
            "INSERT INTO opresults (id, application, success, output, created)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                result.id,
                result.application,
                result.success,
                result.output,
                result.created.timestamp_micros()
            ],
        )
        .map_err(StoreError::storage(OP))?;

        debug!(id = %result.id, application = %result.application, success = result.success, "stored result");
        Ok(result)
    }

    fn get_by_id(&self, id: &str) -> StoreResult<OperationResult> {
        const OP: &str = "get_by_id";

        if id.is_empty() {
            return Err(StoreError::invalid(OP, "id must not be empty"));
        }

        let conn = self.pool.get().map_err(StoreError::storage(OP))?;
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM opresults WHERE id = ?1"),
            [id],
            row_to_result,
        )
        .optional()
        .map_err(StoreError::storage(OP))?
        .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn get_all(&self) -> StoreResult<Vec<OperationResult>> {
        const OP: &str = "get_all";

        let conn = self.pool.get().map_err(StoreError::storage(OP))?;
        let mut stmt = conn
            .prepare(&format!("SELECT {COLUMNS} FROM opresults {ORDER}"))
            .map_err(StoreError::storage(OP))?;
        let rows = stmt
            .query_map([], row_to_result)
            .map_err(StoreError::storage(OP))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::storage(OP))
    }

    fn get_paged_items(
        &self,
        page_size: i64,
        skip: i64,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        application: &str,
    ) -> StoreResult<PagedResults> {
        const OP: &str = "get_paged_items";

        if page_size < 0 {
            return Err(StoreError::invalid(
                OP,
                format!("page_size must not be negative, got {page_size}"),
            ));
        }
        if skip < 0 {
            return Err(StoreError::invalid(
                OP,
                format!("skip must not be negative, got {skip}"),
            ));
        }

        let filter = ResultFilter::from_query(from, until, application);
        let where_sql = filter.where_sql();
        let mut values = filter.params();

        let mut conn = self.pool.get().map_err(StoreError::storage(OP))?;
        // count and fetch read the same snapshot
        let tx = conn.transaction().map_err(StoreError::storage(OP))?;

        let total_count: i64 = tx
            .query_row(
                &format!("SELECT COUNT(*) FROM opresults{where_sql}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .map_err(StoreError::storage(OP))?;

        let items = if page_size == 0 || skip >= total_count {
            Vec::new()
        } else {
            values.push(Value::Integer(page_size));
            values.push(Value::Integer(skip));

            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM opresults{where_sql} {ORDER} LIMIT ? OFFSET ?"
                ))
                .map_err(StoreError::storage(OP))?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), row_to_result)
                .map_err(StoreError::storage(OP))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::storage(OP))?
        };

        tx.commit().map_err(StoreError::storage(OP))?;

        debug!(
            page_size,
            skip,
            filters = filter.clauses().len(),
            total_count,
            returned = items.len(),
            "paged query"
        );
        Ok(PagedResults { total_count, items })
    }

    fn get_avail_apps(&self) -> StoreResult<Vec<String>> {
        const OP: &str = "get_avail_apps";

        let conn = self.pool.get().map_err(StoreError::storage(OP))?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT application FROM opresults ORDER BY application ASC")
            .map_err(StoreError::storage(OP))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(StoreError::storage(OP))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::storage(OP))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_result(app: &str, success: bool, output: &str) -> NewOperationResult {
        NewOperationResult {
            application: app.to_string(),
            success,
            output: output.to_string(),
        }
    }

    #[test]
    fn test_create_assigns_id_and_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_all().unwrap().is_empty());

        let before = Utc::now();
        let item = store.create(new_result("test", true, "")).unwrap();

        assert!(!item.id.is_empty());
        assert!(Uuid::parse_str(&item.id).is_ok());
        assert!(
            item.created >= before.trunc_subsecs(6),
            "created {} precedes {} at microsecond precision",
            item.created,
            before
        );
        assert_eq!(item.application, "test");
        assert!(item.success);

        let all = store.get_all().unwrap();
        assert_eq!(all, vec![item]);
    }

    #[test]
    fn test_create_ids_are_unique() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create(new_result("a", true, "x")).unwrap();
        let b = store.create(new_result("a", true, "x")).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_create_rejects_empty_application() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.create(new_result("", true, "out")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument { operation: "create", .. }));
    }

    #[test]
    fn test_create_rejects_oversized_output() {
        let pool = crate::storage::open_memory_pool().unwrap();
        let config = StoreConfig {
            max_output_bytes: 4,
            ..StoreConfig::default()
        };
        let store = SqliteStore::with_pool(pool, &config);

        assert!(store.create(new_result("a", true, "1234")).is_ok());
        let err = store.create(new_result("a", true, "12345")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument { .. }));
    }

    #[test]
    fn test_get_by_id_roundtrip_and_errors() {
        let store = SqliteStore::open_in_memory().unwrap();
        let item = store.create(new_result("app", false, "boom")).unwrap();

        assert_eq!(store.get_by_id(&item.id).unwrap(), item);
        assert!(matches!(
            store.get_by_id("").unwrap_err(),
            StoreError::InvalidArgument { .. }
        ));
        assert!(matches!(
            store.get_by_id("nonexistent").unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn test_get_all_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        for app in ["test1", "test2", "test3"] {
            store.create(new_result(app, true, "")).unwrap();
        }

        let items = store.get_all().unwrap();
        let apps: Vec<&str> = items.iter().map(|i| i.application.as_str()).collect();
        assert_eq!(apps, vec!["test3", "test2", "test1"]);
        assert!(items.windows(2).all(|w| w[0].created >= w[1].created));
    }

    #[test]
    fn test_paged_items_application_filter() {
        let store = SqliteStore::open_in_memory().unwrap();
        for app in ["backup", "sync", "backup", "report", "backup"] {
            store.create(new_result(app, true, "")).unwrap();
        }

        let page = store.get_paged_items(2, 0, None, None, "backup").unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|i| i.application == "backup"));

        let page = store.get_paged_items(10, 0, None, None, "missing").unwrap();
        assert_eq!(page.total_count, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_paged_items_exact_bounds_are_inclusive() {
        let store = SqliteStore::open_in_memory().unwrap();
        let item = store.create(new_result("a", true, "")).unwrap();

        let page = store
            .get_paged_items(10, 0, Some(item.created), Some(item.created), "")
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items, vec![item]);
    }

    #[test]
    fn test_paged_items_from_inside_a_microsecond() {
        let store = SqliteStore::open_in_memory().unwrap();
        let item = store.create(new_result("a", true, "")).unwrap();
        let later = item.created + chrono::Duration::nanoseconds(500);

        let page = store.get_paged_items(10, 0, Some(later), None, "").unwrap();
        assert_eq!(page.total_count, 0);
        assert!(page.items.is_empty());

        let page = store.get_paged_items(10, 0, None, Some(later), "").unwrap();
        assert_eq!(page.total_count, 1);
    }

    #[test]
    fn test_equal_timestamps_order_by_insertion() {
        let pool = crate::storage::open_memory_pool().unwrap();
        let created = Utc::now().trunc_subsecs(6).timestamp_micros();
        {
            let conn = pool.get().unwrap();
            for (id, app) in [("id-1", "first"), ("id-2", "second"), ("id-3", "third")] {
                conn.execute(
                    "INSERT INTO opresults (id, application, success, output, created)
                     VALUES (?1, ?2, 1, '', ?3)",
                    params![id, app, created],
                )
                .unwrap();
            }
        }
        let store = SqliteStore::with_pool(pool, &StoreConfig::default());

        let all = store.get_all().unwrap();
        let apps: Vec<&str> = all.iter().map(|i| i.application.as_str()).collect();
        assert_eq!(apps, vec!["third", "second", "first"]);

        let page = store.get_paged_items(2, 0, None, None, "").unwrap();
        assert_eq!(page.total_count, 3);
        let ids: Vec<&str> = page.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["id-3", "id-2"]);

        let page = store.get_paged_items(2, 2, None, None, "").unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "id-1");
    }

    #[test]
    fn test_paged_items_rejects_negative_arguments() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.get_paged_items(-2, 0, None, None, "").unwrap_err();
        assert!(err.to_string().contains("page_size"));
        let err = store.get_paged_items(0, -3, None, None, "").unwrap_err();
        assert!(err.to_string().contains("skip"));
    }

    #[test]
    fn test_avail_apps_distinct_sorted() {
        let store = SqliteStore::open_in_memory().unwrap();
        for app in ["zeta", "alpha", "mid", "alpha", "zeta"] {
            store.create(new_result(app, true, "")).unwrap();
        }
        assert_eq!(store.get_avail_apps().unwrap(), vec!["alpha", "mid", "zeta"]);
    }
}
