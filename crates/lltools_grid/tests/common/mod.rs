#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use lltools_grid::registry::ColumnRegistry;
use lltools_grid::store::{DatabaseTarget, SqliteSource};
use lltools_grid::{run_with_shutdown, GridConfig};
use rusqlite::{params, Connection};
use tempfile::TempDir;
use tokio::sync::oneshot;

pub const WORDS_TABLE_DDL: &str = "CREATE TABLE words (
    word TEXT,
    gloss TEXT,
    note TEXT,
    tags TEXT,
    rank INTEGER
);";

pub const VOCABULARY_TABLE_DDL: &str = "CREATE TABLE vocabulary_master (
    italian TEXT,
    english TEXT,
    part_of_speech TEXT,
    course TEXT,
    tags TEXT,
    wiktionary_rank INTEGER,
    it_2012_occurrences INTEGER
);
CREATE TABLE vocabulary_deduplicated (
    italian TEXT,
    tags TEXT
);";

/// Five-column registry over `words`: word(0), gloss(1), note(2), tags(3), rank(4).
pub fn words_registry() -> ColumnRegistry {
    ColumnRegistry::builder("words", "rowid")
        .text("word")
        .text("gloss")
        .text("note")
        .text("tags")
        .integer("rank")
        .build()
        .expect("words registry")
}

/// SQLite database with 25 `words` rows. Row `i` (rowid `i`, 1-based) has
/// word `cat{i}` when `i % 5 == 0` and `dog{i}` otherwise, gloss
/// `g{26 - i:02}`, and note `concatenate` on even rows.
pub struct WordsDb {
    pub path: PathBuf,
    _temp_dir: TempDir,
}

impl WordsDb {
    pub fn seed() -> Result<Self> {
        let temp_dir = TempDir::new().context("create temp dir")?;
        let path = temp_dir.path().join("words.db");
        let conn = Connection::open(&path).context("open words db")?;
        conn.execute_batch(WORDS_TABLE_DDL)
            .context("create words table")?;
        for i in 1..=25i64 {
            let word = if i % 5 == 0 {
                format!("cat{i}")
            } else {
                format!("dog{i}")
            };
            let note = if i % 2 == 0 { Some("concatenate") } else { None };
            conn.execute(
                "INSERT INTO words (word, gloss, note, tags, rank) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![word, format!("g{:02}", 26 - i), note, "noun", i * 10],
            )
            .with_context(|| format!("insert words row {i}"))?;
        }
        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    pub fn source(&self) -> SqliteSource {
        SqliteSource::new(self.path.clone())
    }

    pub fn count_rows(&self) -> Result<i64> {
        let conn = Connection::open(&self.path)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM words", [], |row| row.get(0))?)
    }

    pub fn word_at(&self, rowid: i64) -> Result<Option<String>> {
        let conn = Connection::open(&self.path)?;
        let mut stmt = conn.prepare("SELECT word FROM words WHERE rowid = ?1")?;
        let mut rows = stmt.query(params![rowid])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

/// Seeds the vocabulary layout used by the default server configuration.
pub fn seed_vocabulary(path: &Path) -> Result<()> {
    let conn = Connection::open(path).context("open vocabulary db")?;
    conn.execute_batch(VOCABULARY_TABLE_DDL)
        .context("create vocabulary tables")?;
    let rows: [(&str, &str, &str, &str, &str, i64, i64); 4] = [
        ("gatto", "cat", "noun", "basics", "animals", 900, 1200),
        ("cane", "dog", "noun", "basics", "animals", 800, 1500),
        ("correre", "run", "verb", "basics", "verbs", 400, 3000),
        ("casa", "house", "noun", "home", "places", 100, 9000),
    ];
    for (italian, english, pos, course, tags, rank, occurrences) in rows {
        conn.execute(
            "INSERT INTO vocabulary_master VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![italian, english, pos, course, tags, rank, occurrences],
        )
        .with_context(|| format!("insert vocabulary row {italian}"))?;
        conn.execute(
            "INSERT INTO vocabulary_deduplicated VALUES (?1, ?2)",
            params![italian, tags],
        )
        .with_context(|| format!("insert deduplicated row {italian}"))?;
    }
    Ok(())
}

/// Grid server running on a SQLite vocabulary database.
pub struct TestServer {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    shutdown_tx: Option<oneshot::Sender<()>>,
    runtime_task: Option<tokio::task::JoinHandle<anyhow::Result<()>>>,
    _temp_dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let temp_dir = TempDir::new().context("create temp dir")?;
        let db_path = temp_dir.path().join("lltools.db");
        seed_vocabulary(&db_path)?;

        let addr: SocketAddr = format!("127.0.0.1:{}", free_port()?).parse()?;
        let config = GridConfig {
            listen_addr: addr,
            database: DatabaseTarget::Sqlite {
                path: db_path.clone(),
            },
            route: "/vocabulary".to_string(),
            table: "vocabulary_master".to_string(),
            tag_source_table: "vocabulary_deduplicated".to_string(),
            row_id_column: "rowid".to_string(),
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let runtime_task = tokio::spawn(async move {
            run_with_shutdown(config, async move {
                let _ = shutdown_rx.await;
                Ok::<(), std::io::Error>(())
            })
            .await
        });

        wait_for_live(addr, Duration::from_secs(10))
            .await
            .context("wait for grid server")?;

        Ok(Self {
            addr,
            db_path,
            shutdown_tx: Some(shutdown_tx),
            runtime_task: Some(runtime_task),
            _temp_dir: temp_dir,
        })
    }

    pub async fn get(&self, path_and_query: &str) -> Result<HttpResponse> {
        let request = format!(
            "GET {path_and_query} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
        );
        send(self.addr, request).await
    }

    pub async fn post_form(&self, path: &str, body: &str) -> Result<HttpResponse> {
        let request = format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        send(self.addr, request).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.runtime_task.take() {
            task.abort();
        }
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.body).with_context(|| format!("decode json body: {}", self.body))
    }
}

pub fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

async fn wait_for_live(addr: SocketAddr, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let probe = "GET /live HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n".to_string();
        if let Ok(response) = send(addr, probe).await {
            if response.status == 200 {
                return Ok(());
            }
        }
        if Instant::now() >= deadline {
            anyhow::bail!("timed out waiting for /live on {addr}");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Writes one raw request on a fresh blocking socket and reads to EOF.
async fn send(addr: SocketAddr, request: String) -> Result<HttpResponse> {
    tokio::task::spawn_blocking(move || -> Result<HttpResponse> {
        let mut stream = TcpStream::connect(addr).context("connect grid server")?;
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .context("set read timeout")?;
        stream
            .write_all(request.as_bytes())
            .context("write http request")?;

        let mut resp = String::new();
        stream
            .read_to_string(&mut resp)
            .context("read http response")?;
        let status = resp
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .ok_or_else(|| anyhow::anyhow!("invalid http response: {resp}"))?
            .parse::<u16>()
            .context("parse http status code")?;
        let body = resp
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        Ok(HttpResponse { status, body })
    })
    .await
    .context("join http request task")?
}
