use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::backup::Progress;
use rusqlite::{params, Connection, DatabaseName, OptionalExtension};

use crate::parser::{Meaning, Word};

/// Word/meaning tables. Worked on in memory; the file is only written by `save`.
pub struct Dataset {
    conn: Connection,
}

/// Row handle returned by `upsert_word`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordHandle(i64);

#[derive(Debug, PartialEq, Eq)]
pub struct Stats {
    pub words: usize,
    pub meanings: usize,
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys=ON;

        CREATE TABLE IF NOT EXISTS words (
            id          INTEGER PRIMARY KEY,
            reading     TEXT NOT NULL,
            hanja       TEXT,
            item_number INTEGER,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS meanings (
            word_id     INTEGER NOT NULL REFERENCES words(id) ON DELETE CASCADE,
            ordinal     INTEGER NOT NULL,
            pos         TEXT,
            description TEXT NOT NULL,
            PRIMARY KEY (word_id, ordinal)
        );
        ",
    )?;
    Ok(())
}

impl Dataset {
    pub fn new() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Dataset { conn })
    }

    /// Restore from `path` if it exists, otherwise start empty.
    pub fn load(path: &Path) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        if path.exists() {
            conn.restore(DatabaseName::Main, path, None::<fn(Progress)>)
                .with_context(|| format!("Failed to read dataset {:?}", path))?;
        }
        init_schema(&conn)?;
        Ok(Dataset { conn })
    }

    /// Write the whole dataset to `path`, creating the file if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.conn
            .backup(DatabaseName::Main, path, None)
            .with_context(|| format!("Failed to write dataset {:?}", path))?;
        Ok(())
    }

    /// Insert or replace the word row. Existing meanings for the id are cleared.
    pub fn upsert_word(
        &self,
        id: i64,
        reading: &str,
        hanja: Option<&str>,
        item_number: Option<i32>,
    ) -> Result<WordHandle> {
        self.conn.execute(
            "INSERT INTO words (id, reading, hanja, item_number) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                reading = excluded.reading,
                hanja = excluded.hanja,
                item_number = excluded.item_number,
                updated_at = datetime('now')",
            params![id, reading, hanja, item_number],
        )?;
        self.conn
            .execute("DELETE FROM meanings WHERE word_id = ?1", params![id])?;
        Ok(WordHandle(id))
    }

    pub fn add_meaning(
        &self,
        word: WordHandle,
        ordinal: i64,
        pos: Option<&str>,
        description: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meanings (word_id, ordinal, pos, description) VALUES (?1, ?2, ?3, ?4)",
            params![word.0, ordinal, pos, description],
        )?;
        Ok(())
    }

    /// Upsert one extracted word and its meanings, numbered 1.. in page order.
    /// Returns the number of meaning rows written.
    pub fn merge_word(&self, word: &Word) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let handle = self.upsert_word(
            word.id,
            &word.reading,
            word.hanja.as_deref(),
            word.item_number,
        )?;
        for (i, m) in word.meanings.iter().enumerate() {
            self.add_meaning(handle, i as i64 + 1, m.pos.as_deref(), &m.description)?;
        }
        tx.commit()?;
        Ok(word.meanings.len())
    }

    pub fn stats(&self) -> Result<Stats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |r| r.get(0))?;
            Ok(n as usize)
        };
        Ok(Stats {
            words: count("SELECT COUNT(*) FROM words")?,
            meanings: count("SELECT COUNT(*) FROM meanings")?,
        })
    }

    /// Read a stored word back. Meaning ids are the stored ordinals.
    pub fn word(&self, id: i64) -> Result<Option<Word>> {
        let head = self
            .conn
            .query_row(
                "SELECT reading, hanja, item_number FROM words WHERE id = ?1",
                params![id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, Option<String>>(1)?,
                        r.get::<_, Option<i32>>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((reading, hanja, item_number)) = head else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT ordinal, pos, description FROM meanings WHERE word_id = ?1 ORDER BY ordinal",
        )?;
        let meanings = stmt
            .query_map(params![id], |r| {
                Ok(Meaning {
                    id: r.get(0)?,
                    pos: r.get(1)?,
                    description: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Word {
            id,
            reading,
            item_number,
            hanja,
            meanings,
        }))
    }
}
