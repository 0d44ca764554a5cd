use super::now_stamp;
use crate::error::Result;
use crate::model::LogEntry;
use rusqlite::Connection;

/// Appends one audit row, then trims to the newest `max_entries`.
pub fn append(
    conn: &Connection,
    actor: &str,
    action: &str,
    details: Option<&str>,
    max_entries: usize,
) -> Result<()> {
    conn.execute(
        "INSERT INTO system_logs(at, actor, action, details) VALUES(?, ?, ?, ?)",
        (now_stamp(), actor, action, details),
    )?;
    conn.execute(
        "DELETE FROM system_logs
         WHERE id NOT IN (SELECT id FROM system_logs ORDER BY id DESC LIMIT ?)",
        [max_entries as i64],
    )?;
    Ok(())
}

/// Newest first.
pub fn list(conn: &Connection, limit: usize) -> Result<Vec<LogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, at, actor, action, details FROM system_logs ORDER BY id DESC LIMIT ?",
    )?;
    let rows = stmt
        .query_map([limit as i64], |r| {
            Ok(LogEntry {
                id: r.get(0)?,
                at: r.get(1)?,
                actor: r.get(2)?,
                action: r.get(3)?,
                details: r.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn clear(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("DELETE FROM system_logs", [])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::open_temp;

    #[test]
    fn append_trims_to_newest_entries() {
        let (conn, ws) = open_temp();
        for i in 0..5 {
            append(&conn, "system", &format!("action.{}", i), None, 3).unwrap();
        }
        let rows = list(&conn, 10).unwrap();
        let actions: Vec<&str> = rows.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["action.4", "action.3", "action.2"]);
        assert_eq!(clear(&conn).unwrap(), 3);
        assert!(list(&conn, 10).unwrap().is_empty());
        let _ = std::fs::remove_dir_all(ws);
    }
}
