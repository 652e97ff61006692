use log::{debug, error, info, warn};
use rusqlite::{params, Connection, DatabaseName, Result, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoemRecord {
    #[serde(alias = "number")]
    pub id: i32,
    pub author: String,
    pub upper: String,
    pub lower: String,
    #[serde(default)]
    pub upper_reading: String,
    #[serde(default)]
    pub lower_reading: String,
    #[serde(default)]
    pub description: String,
}

impl PoemRecord {
    pub fn add(connection: &Connection, src: &PoemRecord) -> Result<()> {
        match connection.execute(
            "INSERT INTO \
            Poem(id, author, upper, lower, upperReading, lowerReading, description) \
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                src.id,
                src.author,
                src.upper,
                src.lower,
                src.upper_reading,
                src.lower_reading,
                src.description
            ],
        ) {
            Ok(_) => {
                debug!("[DB] Created new Poem {} by '{}'", src.id, src.author);
                Ok(())
            }
            Err(err) => {
                error!("[DB] Error while creating new Poem {}: {:?}", src.id, err);
                Err(err)
            }
        }
    }

    pub fn delete(connection: &Connection, id: i32) -> Result<()> {
        match connection.execute("DELETE FROM Poem WHERE id = ?1", params![id]) {
            Ok(_) => {
                debug!("[DB] Deleted Poem {}", id);
                Ok(())
            }
            Err(err) => {
                error!("[DB] Error while deleting Poem {}: {:?}", id, err);
                Err(err)
            }
        }
    }

    fn from_row(row: &Row) -> Result<PoemRecord> {
        Ok(PoemRecord {
            id: row.get(0)?,
            author: row.get(1)?,
            upper: row.get(2)?,
            lower: row.get(3)?,
            upper_reading: row.get(4)?,
            lower_reading: row.get(5)?,
            description: row.get(6)?,
        })
    }

    pub fn get_all(connection: &Connection) -> Result<Vec<PoemRecord>> {
        let mut statement = connection.prepare("SELECT * FROM Poem ORDER BY id")?;
        let rows = statement.query_map([], Self::from_row)?;

        rows.collect()
    }

    pub fn get_by_id(connection: &Connection, id: i32) -> Result<PoemRecord> {
        let mut statement = connection.prepare("SELECT * FROM Poem WHERE id = :id LIMIT 1")?;
        statement.query_row(&[(":id", &id)], Self::from_row)
    }

    pub fn exists(connection: &Connection, id: i32) -> Result<bool> {
        match Self::get_by_id(connection, id) {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn get_by_author(connection: &Connection, author: &str) -> Result<Vec<PoemRecord>> {
        let mut statement =
            connection.prepare("SELECT * FROM Poem WHERE author = :author ORDER BY id")?;
        let rows = statement.query_map(&[(":author", &author)], Self::from_row)?;

        rows.collect()
    }

    /// Case-insensitive substring match over fragments, readings, author and description.
    pub fn search(connection: &Connection, keyword: &str) -> Result<Vec<PoemRecord>> {
        if keyword.trim().is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", keyword.trim());
        let mut statement = connection.prepare(
            "SELECT * FROM Poem WHERE \
            upper LIKE :p OR lower LIKE :p OR author LIKE :p OR \
            upperReading LIKE :p OR lowerReading LIKE :p OR description LIKE :p \
            ORDER BY id",
        )?;
        let rows = statement.query_map(&[(":p", &pattern)], Self::from_row)?;

        rows.collect()
    }

    pub fn count(connection: &Connection) -> Result<usize> {
        let mut statement = connection.prepare("SELECT COUNT(*) FROM Poem")?;
        let count: i64 = statement.query_row([], |row| row.get(0))?;
        Ok(count as usize)
    }
}

pub(crate) fn create_or_open(src: &Path) -> Result<Connection> {
    if src.exists() {
        info!("[DB] Opening existing Database");
        open_db(src)
    } else {
        info!("[DB] Creating new Database");
        create_db(src)
    }
}

pub(crate) fn create_db(dest: &Path) -> Result<Connection> {
    let now = Instant::now();
    let db = init_db(Connection::open_in_memory()?)?;
    match db.backup(DatabaseName::Main, dest, None) {
        Ok(_) => {
            debug!(
                "[DB] Creating and Saving took {} ms.",
                now.elapsed().as_millis()
            );
            // Reopen from disk so later writes land in the file.
            close_db(db)?;
            open_db(dest)
        }
        Err(err) => {
            warn!("[DB] Failed to create database file: {}", err);
            close_db(db)?;
            Err(err)
        }
    }
}

pub(crate) fn open_db(src: &Path) -> Result<Connection> {
    let now = Instant::now();
    let db = Connection::open(src)?;
    debug!("[DB] Opening took {} ms.", now.elapsed().as_millis());
    Ok(db)
}

pub(crate) fn close_db(connection: Connection) -> Result<()> {
    info!("[DB] Closing Database");
    let mut connection = connection;
    for attempt in 1..=3 {
        match connection.close() {
            Ok(_) => return Ok(()),
            Err((conn, err)) => {
                error!("[DB] Cannot close connection ({}/3): {}", attempt, err);
                if attempt == 3 {
                    return Err(err);
                }
                connection = conn;
            }
        }
    }
    Ok(())
}

pub(crate) fn init_db(conn: Connection) -> Result<Connection> {
    info!("[DB INIT] Creating tables");
    conn.execute(
        "CREATE TABLE Poem (
              id INTEGER NOT NULL PRIMARY KEY,
              author TEXT NOT NULL,
              upper TEXT NOT NULL,
              lower TEXT NOT NULL,
              upperReading TEXT NOT NULL,
              lowerReading TEXT NOT NULL,
              description TEXT NOT NULL
            )",
        (),
    )?;
    info!("[DB INIT] Created table Poem");
    conn.execute("CREATE INDEX Poem_author_idx ON Poem(author)", ())?;
    info!("[DB INIT] Created index Poem_author_idx");
    info!("[DB INIT] Database Creation Successful!");

    Ok(conn)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn poem(id: i32, author: &str, upper: &str, lower: &str) -> PoemRecord {
        PoemRecord {
            id,
            author: author.to_string(),
            upper: upper.to_string(),
            lower: lower.to_string(),
            upper_reading: String::new(),
            lower_reading: String::new(),
            description: String::new(),
        }
    }

    fn memory_db() -> Connection {
        init_db(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn add_then_get_by_id() {
        let conn = memory_db();
        let record = PoemRecord {
            upper_reading: "あきのたの".to_string(),
            description: "秋の農作業".to_string(),
            ..poem(1, "天智天皇", "秋の田の かりほの庵の 苫をあらみ", "わが衣手は 露にぬれつつ")
        };
        PoemRecord::add(&conn, &record).unwrap();

        assert_eq!(PoemRecord::get_by_id(&conn, 1).unwrap(), record);
        assert_eq!(PoemRecord::count(&conn).unwrap(), 1);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let conn = memory_db();
        PoemRecord::add(&conn, &poem(1, "a", "u", "l")).unwrap();
        assert!(PoemRecord::add(&conn, &poem(1, "b", "u2", "l2")).is_err());
    }

    #[test]
    fn get_all_is_ordered_by_id() {
        let conn = memory_db();
        for id in [3, 1, 2] {
            PoemRecord::add(&conn, &poem(id, "a", "u", "l")).unwrap();
        }
        let ids: Vec<i32> = PoemRecord::get_all(&conn)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn exists_and_delete() {
        let conn = memory_db();
        PoemRecord::add(&conn, &poem(7, "a", "u", "l")).unwrap();
        assert!(PoemRecord::exists(&conn, 7).unwrap());
        PoemRecord::delete(&conn, 7).unwrap();
        assert!(!PoemRecord::exists(&conn, 7).unwrap());
    }

    #[test]
    fn get_by_author_filters() {
        let conn = memory_db();
        PoemRecord::add(&conn, &poem(1, "持統天皇", "春過ぎて", "衣ほすてふ")).unwrap();
        PoemRecord::add(&conn, &poem(2, "柿本人麻呂", "あしびきの", "ながながし夜を")).unwrap();
        let found = PoemRecord::get_by_author(&conn, "持統天皇").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 1);
    }

    #[test]
    fn search_matches_any_text_field() {
        let conn = memory_db();
        PoemRecord::add(&conn, &poem(1, "持統天皇", "春過ぎて", "衣ほすてふ")).unwrap();
        PoemRecord::add(
            &conn,
            &PoemRecord {
                description: "山鳥の尾".to_string(),
                ..poem(2, "柿本人麻呂", "あしびきの", "ながながし夜を")
            },
        )
        .unwrap();

        assert_eq!(PoemRecord::search(&conn, "春").unwrap().len(), 1);
        assert_eq!(PoemRecord::search(&conn, "山鳥").unwrap()[0].id, 2);
        assert!(PoemRecord::search(&conn, "  ").unwrap().is_empty());
    }

    #[test]
    fn create_or_open_persists_to_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("poems.db");

        let conn = create_or_open(&path).unwrap();
        PoemRecord::add(&conn, &poem(1, "a", "u", "l")).unwrap();
        close_db(conn).unwrap();
        assert!(path.exists());

        let conn = create_or_open(&path).unwrap();
        assert_eq!(PoemRecord::count(&conn).unwrap(), 1);
        close_db(conn).unwrap();
    }

    #[test]
    fn json_accepts_number_alias_and_optional_fields() {
        let parsed: PoemRecord = serde_json::from_str(
            r#"{"number": 5, "author": "猿丸大夫", "upper": "奥山に", "lower": "声きく時ぞ"}"#,
        )
        .unwrap();
        assert_eq!(parsed.id, 5);
        assert!(parsed.upper_reading.is_empty());
        assert!(parsed.description.is_empty());
    }
}
