//! An in-process scripted Redis good enough for the sync-state protocol:
//! real RESP framing, a key space shared across connections (markers must
//! survive reconnects), and canned error replies for designated keys.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Key whose GET always answers with an error reply.
pub const BOOM_KEY: &str = "clawbrain_test:boom";

type SharedStore = Arc<Mutex<HashMap<String, String>>>;

/// Start the mock server on an ephemeral port and return its address.
pub async fn spawn() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let store: SharedStore = Arc::new(Mutex::new(HashMap::new()));
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(serve_connection(stream, store.clone()));
        }
    });
    addr
}

async fn serve_connection(stream: TcpStream, store: SharedStore) {
    let mut reader = BufReader::new(stream);
    loop {
        let Some(command) = read_command(&mut reader).await else {
            return;
        };
        let reply = dispatch(&command, &mut store.lock().unwrap());
        if reader.get_mut().write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Parse one RESP array command: `*<count>` then `$<len><data>` per arg.
async fn read_command(reader: &mut BufReader<TcpStream>) -> Option<Vec<String>> {
    let mut header = String::new();
    if reader.read_line(&mut header).await.ok()? == 0 {
        return None;
    }
    let count: usize = header.trim_end().strip_prefix('*')?.parse().ok()?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let mut length_line = String::new();
        reader.read_line(&mut length_line).await.ok()?;
        let length: usize = length_line.trim_end().strip_prefix('$')?.parse().ok()?;
        let mut data = vec![0u8; length + 2];
        reader.read_exact(&mut data).await.ok()?;
        data.truncate(length);
        args.push(String::from_utf8(data).ok()?);
    }
    Some(args)
}

fn dispatch(args: &[String], store: &mut HashMap<String, String>) -> String {
    match args[0].to_ascii_uppercase().as_str() {
        "PING" => "+PONG\r\n".to_string(),
        "SET" => {
            let plain = args.len() == 3;
            let with_ex = args.len() == 5
                && args[3].eq_ignore_ascii_case("EX")
                && args[4].parse::<u64>().is_ok();
            if !plain && !with_ex {
                return "-ERR syntax error\r\n".to_string();
            }
            store.insert(args[1].clone(), args[2].clone());
            "+OK\r\n".to_string()
        }
        "GET" => {
            if args[1] == BOOM_KEY {
                return "-ERR simulated failure\r\n".to_string();
            }
            match store.get(&args[1]) {
                Some(value) => format!("${}\r\n{value}\r\n", value.len()),
                None => "$-1\r\n".to_string(),
            }
        }
        "EXISTS" => format!(":{}\r\n", u8::from(store.contains_key(&args[1]))),
        "DEL" => format!(":{}\r\n", u8::from(store.remove(&args[1]).is_some())),
        _ => "-ERR unknown command\r\n".to_string(),
    }
}
