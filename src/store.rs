use rusqlite::{Connection, params};
use std::sync::Mutex;

use crate::models::alert::{Alert, AlertHistory, AlertType};
use crate::models::integration::{
    Integration, IntegrationStatus, MetricSeries, Provider, Workspace,
};
use crate::models::snapshot::MetricSnapshot;
use crate::pipeline::types::UnifiedSnapshot;

/// An alert that fired during a persist call, together with the history
/// row written for it. Handed to the dispatch layer after commit.
#[derive(Debug, Clone)]
pub struct TriggeredAlert {
    pub alert: Alert,
    pub history: AlertHistory,
}

pub fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn bad_column(idx: usize, detail: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, detail.into())
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS workspaces (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );

            CREATE TABLE IF NOT EXISTS secrets (
                id         TEXT PRIMARY KEY,
                token      TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );

            CREATE TABLE IF NOT EXISTS integrations (
                id              TEXT PRIMARY KEY,
                workspace_id    TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
                provider        TEXT NOT NULL CHECK(provider IN ('SENTRY','VERCEL','POSTHOG','STRIPE','INTERCOM')),
                status          TEXT NOT NULL DEFAULT 'ACTIVE' CHECK(status IN ('ACTIVE','ERROR','DISCONNECTED')),
                secret_id       TEXT NOT NULL REFERENCES secrets(id),
                public_metadata TEXT NOT NULL DEFAULT '{}',
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
                UNIQUE(workspace_id, provider)
            );
            CREATE INDEX IF NOT EXISTS idx_integrations_workspace ON integrations(workspace_id);

            CREATE TABLE IF NOT EXISTS metric_series (
                id             TEXT PRIMARY KEY,
                workspace_id   TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
                integration_id TEXT NOT NULL REFERENCES integrations(id) ON DELETE CASCADE,
                metric_key     TEXT NOT NULL,
                display_name   TEXT NOT NULL,
                settings       TEXT NOT NULL DEFAULT '{}',
                created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );
            CREATE INDEX IF NOT EXISTS idx_series_integration ON metric_series(integration_id);
            CREATE INDEX IF NOT EXISTS idx_series_workspace ON metric_series(workspace_id);

            CREATE TABLE IF NOT EXISTS metric_snapshots (
                id          TEXT PRIMARY KEY,
                series_id   TEXT NOT NULL REFERENCES metric_series(id) ON DELETE CASCADE,
                value       REAL NOT NULL,
                captured_at TEXT NOT NULL,
                metadata    TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_series ON metric_snapshots(series_id, captured_at DESC);

            CREATE TABLE IF NOT EXISTS alerts (
                id         TEXT PRIMARY KEY,
                series_id  TEXT NOT NULL REFERENCES metric_series(id) ON DELETE CASCADE,
                alert_type TEXT NOT NULL CHECK(alert_type IN ('ABOVE_THRESHOLD','BELOW_THRESHOLD','CHANGE_PERCENT')),
                threshold  REAL NOT NULL,
                enabled    INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_series ON alerts(series_id);

            CREATE TABLE IF NOT EXISTS alert_history (
                id         TEXT PRIMARY KEY,
                alert_id   TEXT NOT NULL REFERENCES alerts(id) ON DELETE CASCADE,
                value      REAL NOT NULL,
                message    TEXT NOT NULL,
                dispatched INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );
            CREATE INDEX IF NOT EXISTS idx_history_alert ON alert_history(alert_id, created_at DESC);
            ",
        )?;
        Ok(())
    }

    // ── Workspace operations ──

    pub fn create_workspace(&self, id: &str, name: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO workspaces (id, name) VALUES (?1, ?2)",
            params![id, name],
        )?;
        Ok(())
    }

    pub fn list_workspaces(&self) -> anyhow::Result<Vec<Workspace>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, name, created_at FROM workspaces ORDER BY created_at DESC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Workspace {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_workspace(&self, id: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute("DELETE FROM workspaces WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }

    // ── Integration operations ──

    /// Stores the secret and the integration in one transaction. The
    /// caller provisions default series afterwards.
    pub fn create_integration(
        &self,
        id: &str,
        workspace_id: &str,
        provider: Provider,
        secret_value: &str,
        public_metadata: &str,
    ) -> anyhow::Result<Integration> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let secret_id = uuid::Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO secrets (id, token) VALUES (?1, ?2)",
            params![secret_id, secret_value],
        )?;
        tx.execute(
            "INSERT INTO integrations (id, workspace_id, provider, status, secret_id, public_metadata) \
             VALUES (?1, ?2, ?3, 'ACTIVE', ?4, ?5)",
            params![id, workspace_id, provider.as_str(), secret_id, public_metadata],
        )?;
        tx.commit()?;
        Ok(Integration {
            id: id.to_string(),
            workspace_id: workspace_id.to_string(),
            provider,
            status: IntegrationStatus::Active,
            secret_id,
            public_metadata: public_metadata.to_string(),
            created_at: now_iso(),
        })
    }

    pub fn integration_exists(&self, workspace_id: &str, provider: Provider) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM integrations WHERE workspace_id = ?1 AND provider = ?2",
            params![workspace_id, provider.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn integration_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Integration> {
        let provider_s: String = row.get(2)?;
        let status_s: String = row.get(3)?;
        Ok(Integration {
            id: row.get(0)?,
            workspace_id: row.get(1)?,
            provider: Provider::parse(&provider_s)
                .ok_or_else(|| bad_column(2, format!("unknown provider {provider_s}")))?,
            status: IntegrationStatus::parse(&status_s)
                .ok_or_else(|| bad_column(3, format!("unknown status {status_s}")))?,
            secret_id: row.get(4)?,
            public_metadata: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn get_integration(&self, id: &str) -> anyhow::Result<Option<Integration>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, workspace_id, provider, status, secret_id, public_metadata, created_at \
             FROM integrations WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::integration_from_row)?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_integrations(&self) -> anyhow::Result<Vec<Integration>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, workspace_id, provider, status, secret_id, public_metadata, created_at \
             FROM integrations ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map([], Self::integration_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_integration(&self, id: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute("DELETE FROM integrations WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }

    pub fn set_integration_status(
        &self,
        id: &str,
        status: IntegrationStatus,
    ) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE integrations SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(count > 0)
    }

    /// Plaintext credential for an integration, or None if the secret row
    /// is gone. Never exposed over the API; only the vault reads this.
    pub fn get_secret_token(&self, integration_id: &str) -> anyhow::Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT s.token FROM secrets s \
             JOIN integrations i ON i.secret_id = s.id WHERE i.id = ?1",
        )?;
        let mut rows = stmt.query_map(params![integration_id], |row| row.get::<_, String>(0))?;
        Ok(rows.next().transpose()?)
    }

    // ── Series operations ──

    pub fn create_series(
        &self,
        id: &str,
        workspace_id: &str,
        integration_id: &str,
        metric_key: &str,
        display_name: &str,
        settings: &str,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO metric_series (id, workspace_id, integration_id, metric_key, display_name, settings) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, workspace_id, integration_id, metric_key, display_name, settings],
        )?;
        Ok(())
    }

    fn series_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MetricSeries> {
        Ok(MetricSeries {
            id: row.get(0)?,
            workspace_id: row.get(1)?,
            integration_id: row.get(2)?,
            metric_key: row.get(3)?,
            display_name: row.get(4)?,
            settings: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn get_series(&self, id: &str) -> anyhow::Result<Option<MetricSeries>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, workspace_id, integration_id, metric_key, display_name, settings, created_at \
             FROM metric_series WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::series_from_row)?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_series_for_workspace(&self, workspace_id: &str) -> anyhow::Result<Vec<MetricSeries>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, workspace_id, integration_id, metric_key, display_name, settings, created_at \
             FROM metric_series WHERE workspace_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![workspace_id], Self::series_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_series_for_integration(
        &self,
        integration_id: &str,
    ) -> anyhow::Result<Vec<MetricSeries>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, workspace_id, integration_id, metric_key, display_name, settings, created_at \
             FROM metric_series WHERE integration_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![integration_id], Self::series_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_series_settings(&self, id: &str, settings: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE metric_series SET settings = ?2 WHERE id = ?1",
            params![id, settings],
        )?;
        Ok(count > 0)
    }

    /// Discovery query for the sync worker: ids of every series whose
    /// integration is ACTIVE, in one join.
    pub fn list_active_series_ids(&self) -> anyhow::Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT s.id FROM metric_series s \
             JOIN integrations i ON i.id = s.integration_id \
             WHERE i.status = 'ACTIVE' ORDER BY s.created_at ASC",
        )?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_series_with_integration(
        &self,
        series_id: &str,
    ) -> anyhow::Result<Option<(MetricSeries, Integration)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.workspace_id, s.integration_id, s.metric_key, s.display_name, s.settings, s.created_at, \
                    i.id, i.workspace_id, i.provider, i.status, i.secret_id, i.public_metadata, i.created_at \
             FROM metric_series s \
             JOIN integrations i ON i.id = s.integration_id \
             WHERE s.id = ?1",
        )?;
        let mut rows = stmt.query_map(params![series_id], |row| {
            let series = MetricSeries {
                id: row.get(0)?,
                workspace_id: row.get(1)?,
                integration_id: row.get(2)?,
                metric_key: row.get(3)?,
                display_name: row.get(4)?,
                settings: row.get(5)?,
                created_at: row.get(6)?,
            };
            let provider_s: String = row.get(9)?;
            let status_s: String = row.get(10)?;
            let integration = Integration {
                id: row.get(7)?,
                workspace_id: row.get(8)?,
                provider: Provider::parse(&provider_s)
                    .ok_or_else(|| bad_column(9, format!("unknown provider {provider_s}")))?,
                status: IntegrationStatus::parse(&status_s)
                    .ok_or_else(|| bad_column(10, format!("unknown status {status_s}")))?,
                secret_id: row.get(11)?,
                public_metadata: row.get(12)?,
                created_at: row.get(13)?,
            };
            Ok((series, integration))
        })?;
        Ok(rows.next().transpose()?)
    }

    // ── Snapshot operations ──

    pub fn list_snapshots(&self, series_id: &str, limit: i64) -> anyhow::Result<Vec<MetricSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, series_id, value, captured_at, metadata FROM metric_snapshots \
             WHERE series_id = ?1 ORDER BY captured_at DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![series_id, limit], |row| {
                Ok(MetricSnapshot {
                    id: row.get(0)?,
                    series_id: row.get(1)?,
                    value: row.get(2)?,
                    captured_at: row.get(3)?,
                    metadata: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_snapshots(&self, series_id: &str) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM metric_snapshots WHERE series_id = ?1",
            params![series_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Atomic persist step: inserts the batch and evaluates every enabled
    /// alert of the series against the batch-latest snapshot, writing
    /// history rows for triggered rules. Everything happens in one
    /// transaction; on failure no snapshot or history row survives.
    ///
    /// Equal captured_at timestamps resolve to the last snapshot in
    /// insertion order.
    pub fn persist_snapshots(
        &self,
        series_id: &str,
        snapshots: &[UnifiedSnapshot],
    ) -> anyhow::Result<Vec<TriggeredAlert>> {
        if snapshots.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let alerts = {
            let mut stmt = tx.prepare(
                "SELECT id, series_id, alert_type, threshold, enabled, created_at \
                 FROM alerts WHERE series_id = ?1 AND enabled = 1",
            )?;
            let rows = stmt
                .query_map(params![series_id], Self::alert_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        for snap in snapshots {
            let metadata = snap
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            tx.execute(
                "INSERT INTO metric_snapshots (id, series_id, value, captured_at, metadata) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    series_id,
                    snap.value,
                    snap.captured_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                    metadata,
                ],
            )?;
        }

        let latest = snapshots
            .iter()
            .reduce(|best, s| if s.captured_at >= best.captured_at { s } else { best })
            .unwrap();

        let mut triggered = Vec::new();
        for alert in alerts {
            if let Some(message) = alert.evaluate(latest.value) {
                let history = AlertHistory {
                    id: uuid::Uuid::new_v4().to_string(),
                    alert_id: alert.id.clone(),
                    value: latest.value,
                    message,
                    dispatched: false,
                    created_at: now_iso(),
                };
                tx.execute(
                    "INSERT INTO alert_history (id, alert_id, value, message, dispatched, created_at) \
                     VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                    params![
                        history.id,
                        history.alert_id,
                        history.value,
                        history.message,
                        history.created_at,
                    ],
                )?;
                triggered.push(TriggeredAlert { alert, history });
            }
        }

        tx.commit()?;
        Ok(triggered)
    }

    // ── Alert operations ──

    fn alert_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Alert> {
        let type_s: String = row.get(2)?;
        Ok(Alert {
            id: row.get(0)?,
            series_id: row.get(1)?,
            alert_type: AlertType::parse(&type_s)
                .ok_or_else(|| bad_column(2, format!("unknown alert type {type_s}")))?,
            threshold: row.get(3)?,
            enabled: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    pub fn create_alert(
        &self,
        id: &str,
        series_id: &str,
        alert_type: AlertType,
        threshold: f64,
        enabled: bool,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO alerts (id, series_id, alert_type, threshold, enabled) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, series_id, alert_type.as_str(), threshold, enabled],
        )?;
        Ok(())
    }

    pub fn get_alert(&self, id: &str) -> anyhow::Result<Option<Alert>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, series_id, alert_type, threshold, enabled, created_at FROM alerts WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::alert_from_row)?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_alerts_for_series(&self, series_id: &str) -> anyhow::Result<Vec<Alert>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, series_id, alert_type, threshold, enabled, created_at \
             FROM alerts WHERE series_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![series_id], Self::alert_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_alert(
        &self,
        id: &str,
        alert_type: AlertType,
        threshold: f64,
        enabled: bool,
    ) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE alerts SET alert_type = ?2, threshold = ?3, enabled = ?4 WHERE id = ?1",
            params![id, alert_type.as_str(), threshold, enabled],
        )?;
        Ok(count > 0)
    }

    pub fn delete_alert(&self, id: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute("DELETE FROM alerts WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }

    pub fn list_alert_history(&self, alert_id: &str, limit: i64) -> anyhow::Result<Vec<AlertHistory>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, alert_id, value, message, dispatched, created_at \
             FROM alert_history WHERE alert_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![alert_id, limit], |row| {
                Ok(AlertHistory {
                    id: row.get(0)?,
                    alert_id: row.get(1)?,
                    value: row.get(2)?,
                    message: row.get(3)?,
                    dispatched: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn mark_history_dispatched(&self, history_id: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE alert_history SET dispatched = 1 WHERE id = ?1",
            params![history_id],
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn seeded_store() -> (Store, String) {
        let store = Store::open_in_memory().unwrap();
        store.create_workspace("ws1", "Acme").unwrap();
        store
            .create_integration("int1", "ws1", Provider::Sentry, "sandbox", "{}")
            .unwrap();
        store
            .create_series("ser1", "ws1", "int1", "sentry.unresolved_issues", "Unresolved Issues", "{}")
            .unwrap();
        (store, "ser1".to_string())
    }

    fn snap(value: f64, secs: i64) -> UnifiedSnapshot {
        UnifiedSnapshot {
            metric_key: "sentry.unresolved_issues".into(),
            value,
            captured_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            metadata: None,
        }
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let (store, series) = seeded_store();
        let triggered = store.persist_snapshots(&series, &[]).unwrap();
        assert!(triggered.is_empty());
        assert_eq!(store.count_snapshots(&series).unwrap(), 0);
    }

    #[test]
    fn above_threshold_writes_one_history_row() {
        let (store, series) = seeded_store();
        store
            .create_alert("al1", &series, AlertType::AboveThreshold, 100.0, true)
            .unwrap();
        let triggered = store.persist_snapshots(&series, &[snap(150.0, 0)]).unwrap();
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].history.value, 150.0);
        assert!(!triggered[0].history.dispatched);
        let history = store.list_alert_history("al1", 10).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn higher_threshold_does_not_fire() {
        let (store, series) = seeded_store();
        store
            .create_alert("al1", &series, AlertType::AboveThreshold, 200.0, true)
            .unwrap();
        let triggered = store.persist_snapshots(&series, &[snap(150.0, 0)]).unwrap();
        assert!(triggered.is_empty());
        assert!(store.list_alert_history("al1", 10).unwrap().is_empty());
    }

    #[test]
    fn disabled_alerts_are_skipped() {
        let (store, series) = seeded_store();
        store
            .create_alert("al1", &series, AlertType::AboveThreshold, 100.0, false)
            .unwrap();
        let triggered = store.persist_snapshots(&series, &[snap(150.0, 0)]).unwrap();
        assert!(triggered.is_empty());
    }

    #[test]
    fn only_batch_latest_snapshot_is_evaluated() {
        let (store, series) = seeded_store();
        store
            .create_alert("al1", &series, AlertType::AboveThreshold, 100.0, true)
            .unwrap();
        // 50 at T1, 150 at T2: one trigger for the 150 value.
        let triggered = store
            .persist_snapshots(&series, &[snap(50.0, 0), snap(150.0, 60)])
            .unwrap();
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].history.value, 150.0);

        // Reversed insertion order must give the same result.
        let triggered = store
            .persist_snapshots(&series, &[snap(150.0, 120), snap(50.0, 61)])
            .unwrap();
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].history.value, 150.0);
    }

    #[test]
    fn captured_at_ties_resolve_to_last_in_order() {
        let (store, series) = seeded_store();
        store
            .create_alert("al1", &series, AlertType::AboveThreshold, 100.0, true)
            .unwrap();
        let triggered = store
            .persist_snapshots(&series, &[snap(300.0, 0), snap(150.0, 0)])
            .unwrap();
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].history.value, 150.0);
    }

    #[test]
    fn repeated_persists_grow_history_monotonically() {
        let (store, series) = seeded_store();
        store.persist_snapshots(&series, &[snap(1.0, 0)]).unwrap();
        store.persist_snapshots(&series, &[snap(1.0, 0)]).unwrap();
        assert_eq!(store.count_snapshots(&series).unwrap(), 2);
    }

    #[test]
    fn one_integration_per_workspace_and_provider() {
        let (store, _) = seeded_store();
        assert!(store.integration_exists("ws1", Provider::Sentry).unwrap());
        let dup = store.create_integration("int2", "ws1", Provider::Sentry, "tok", "{}");
        assert!(dup.is_err());
        // A different provider is fine.
        store
            .create_integration("int3", "ws1", Provider::Stripe, "tok", "{}")
            .unwrap();
    }

    #[test]
    fn deleting_an_integration_cascades() {
        let (store, series) = seeded_store();
        store
            .create_alert("al1", &series, AlertType::AboveThreshold, 0.0, true)
            .unwrap();
        store.persist_snapshots(&series, &[snap(5.0, 0)]).unwrap();
        assert!(store.delete_integration("int1").unwrap());
        assert!(store.get_series(&series).unwrap().is_none());
        assert_eq!(store.count_snapshots(&series).unwrap(), 0);
        assert!(store.get_alert("al1").unwrap().is_none());
    }

    #[test]
    fn discovery_only_sees_active_integrations() {
        let (store, _) = seeded_store();
        store.create_workspace("ws2", "Beta").unwrap();
        store
            .create_integration("int2", "ws2", Provider::Vercel, "sandbox", "{}")
            .unwrap();
        store
            .create_series("ser2", "ws2", "int2", "vercel.deployment_success", "Deploys", "{}")
            .unwrap();
        store
            .set_integration_status("int2", IntegrationStatus::Error)
            .unwrap();
        let ids = store.list_active_series_ids().unwrap();
        assert_eq!(ids, vec!["ser1".to_string()]);
    }

    #[test]
    fn secret_token_resolves_through_integration() {
        let (store, _) = seeded_store();
        assert_eq!(
            store.get_secret_token("int1").unwrap().as_deref(),
            Some("sandbox")
        );
        assert_eq!(store.get_secret_token("nope").unwrap(), None);
    }

    #[test]
    fn snapshot_metadata_round_trips() {
        let (store, series) = seeded_store();
        let mut s = snap(7.0, 0);
        s.metadata = Some(serde_json::json!({ "currency": "usd" }));
        store.persist_snapshots(&series, &[s]).unwrap();
        let rows = store.list_snapshots(&series, 10).unwrap();
        assert_eq!(rows.len(), 1);
        let meta: serde_json::Value =
            serde_json::from_str(rows[0].metadata.as_deref().unwrap()).unwrap();
        assert_eq!(meta["currency"], "usd");
    }
}
