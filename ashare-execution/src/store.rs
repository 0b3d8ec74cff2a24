use crate::{
    error::ExecutionError,
    order::{BrokerOrderId, Order, OrderId},
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// Durable order persistence over embedded SQLite.
///
/// Every state transition is written through, and startup recovery loads all non-terminal
/// orders so their fill monitors can resume. The order payload is stored as JSON next to the
/// indexed status column; the schema is append-only.
#[derive(Debug)]
pub struct OrderStore {
    conn: Mutex<Connection>,
}

impl OrderStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExecutionError> {
        Self::init(Connection::open(path)?)
    }

    /// Private in-memory store, for tests and throwaway runs.
    pub fn in_memory() -> Result<Self, ExecutionError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ExecutionError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS orders (
                order_id        TEXT PRIMARY KEY,
                broker_order_id TEXT,
                status          TEXT NOT NULL,
                payload         TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or update an order's durable record.
    pub fn upsert(
        &self,
        order: &Order,
        broker_order_id: Option<&BrokerOrderId>,
    ) -> Result<(), ExecutionError> {
        let payload = serde_json::to_string(order)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO orders
             (order_id, broker_order_id, status, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                order.id.to_string(),
                broker_order_id.map(|id| id.to_string()),
                order.status.to_string(),
                payload,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        debug!(order_id = %order.id, status = %order.status, "order persisted");
        Ok(())
    }

    pub fn get(&self, order_id: &OrderId) -> Result<Option<Order>, ExecutionError> {
        let payload: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT payload FROM orders WHERE order_id = ?1",
                params![order_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// All orders that have not reached a terminal state, with their broker ids. Used on
    /// startup to resume fill monitoring.
    pub fn load_non_terminal(&self) -> Result<Vec<(Order, Option<BrokerOrderId>)>, ExecutionError> {
        let conn = self.conn.lock();
        let mut statement = conn.prepare(
            "SELECT payload, broker_order_id FROM orders
             WHERE status NOT IN ('Filled', 'Canceled', 'Rejected', 'Expired')",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut orders = Vec::new();
        for row in rows {
            let (payload, broker_order_id) = row?;
            let order: Order = serde_json::from_str(&payload)?;
            orders.push((order, broker_order_id.map(BrokerOrderId::new)));
        }
        Ok(orders)
    }
}
