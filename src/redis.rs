//! Minimal Redis client speaking RESP.
//!
//! Supports only the commands the sync feature needs: `PING`, `SET`,
//! `SET … EX`, `GET`, `EXISTS`, and `DEL`. The client owns its connection and
//! framed reader; it is opened by the operation that needs it and dropped on
//! scope exit, never shared process-wide.

use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected Redis client.
pub struct Client {
    reader: BufReader<TcpStream>,
}

impl Client {
    /// Connect to a Redis server.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| anyhow::anyhow!("connect to redis at {addr}: timed out"))?
            .with_context(|| format!("connect to redis at {addr}"))?;
        Ok(Self {
            reader: BufReader::new(stream),
        })
    }

    /// Check connectivity with a PING.
    pub async fn ping(&mut self) -> Result<()> {
        self.send(&["PING"]).await?;
        self.read_line().await?;
        Ok(())
    }

    /// Store a key with no expiry.
    pub async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.send(&["SET", key, value]).await?;
        self.read_line().await?;
        Ok(())
    }

    /// Store a key with a TTL in seconds.
    pub async fn set_with_ttl(&mut self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let ttl = ttl_seconds.to_string();
        self.send(&["SET", key, value, "EX", &ttl]).await?;
        self.read_line().await?;
        Ok(())
    }

    /// Fetch a key. `None` when the key does not exist.
    pub async fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.send(&["GET", key]).await?;
        let line = self.read_line().await?;

        // Bulk string reply: "$<len>\r\n<data>\r\n", or "$-1\r\n" for a
        // missing key.
        let Some(length) = line.strip_prefix('$') else {
            bail!("unexpected GET reply: {line:?}");
        };
        let length: i64 = length
            .parse()
            .with_context(|| format!("unexpected GET reply: {line:?}"))?;
        if length == -1 {
            return Ok(None);
        }

        let mut data = vec![0u8; length as usize + 2];
        self.reader
            .read_exact(&mut data)
            .await
            .context("read bulk string")?;
        data.truncate(length as usize);
        Ok(Some(
            String::from_utf8(data).context("bulk string is not valid utf-8")?,
        ))
    }

    /// Whether a key exists.
    pub async fn exists(&mut self, key: &str) -> Result<bool> {
        self.send(&["EXISTS", key]).await?;
        let line = self.read_line().await?;
        match line.strip_prefix(':') {
            Some(count) => Ok(count == "1"),
            None => bail!("unexpected EXISTS reply: {line:?}"),
        }
    }

    /// Remove a key. Removing an absent key is not an error.
    pub async fn del(&mut self, key: &str) -> Result<()> {
        self.send(&["DEL", key]).await?;
        self.read_line().await?;
        Ok(())
    }

    /// Write a RESP array command: `*<count>` then `$<len><data>` per arg.
    async fn send(&mut self, args: &[&str]) -> Result<()> {
        let mut buf = format!("*{}\r\n", args.len());
        for arg in args {
            buf.push_str(&format!("${}\r\n{arg}\r\n", arg.len()));
        }
        self.reader
            .get_mut()
            .write_all(buf.as_bytes())
            .await
            .context("write to redis")?;
        Ok(())
    }

    /// Read one RESP line, stripping the trailing CRLF. An error reply
    /// (`-…`) surfaces as an error.
    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .context("read from redis")?;
        ensure!(read > 0, "redis closed the connection");
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        if let Some(message) = line.strip_prefix('-') {
            bail!("redis error: {message}");
        }
        Ok(line)
    }
}
