//! In-process fake store speaking just enough RESP2 for the client tests.
//!
//! Every command a connection sends is appended to a shared log so tests can
//! assert on the exact wire arguments, including the applied key prefix.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use gtc_client::{PrefixedStore, StoreConfig};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    Hash(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq)]
enum Resp {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<String>),
    Array(Vec<Resp>),
}

#[derive(Default)]
struct State {
    data: HashMap<String, Value>,
    ttls: HashMap<String, i64>,
    log: Vec<Vec<String>>,
    ack_override: Option<String>,
    accepted: usize,
}

/// Handle to a running fake server.
#[derive(Clone)]
pub struct FakeServer {
    addr: String,
    state: Arc<Mutex<State>>,
}

impl FakeServer {
    pub fn start() -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let state = Arc::new(Mutex::new(State::default()));

        let shared = state.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { return };
                shared.lock().unwrap().accepted += 1;
                let shared = shared.clone();
                thread::spawn(move || serve(stream, shared));
            }
        });

        FakeServer { addr, state }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    /// Store with a small waiting pool and the given prefix.
    pub fn store(&self, prefix: &str) -> PrefixedStore {
        self.store_with(|config| config.prefix = prefix.to_string())
    }

    pub fn store_with(&self, tweak: impl FnOnce(&mut StoreConfig)) -> PrefixedStore {
        let mut config = StoreConfig {
            url: self.url(),
            max_idle: 2,
            max_active: 4,
            read_timeout: Some(Duration::from_secs(2)),
            write_timeout: Some(Duration::from_secs(2)),
            connect_timeout: Some(Duration::from_secs(2)),
            ..StoreConfig::default()
        };
        tweak(&mut config);
        PrefixedStore::with_config(config).expect("store")
    }

    /// Every command received so far, in arrival order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().log.clone()
    }

    /// Commands received so far whose name matches `name`.
    pub fn commands_named(&self, name: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|args| args[0].eq_ignore_ascii_case(name))
            .collect()
    }

    pub fn last_command(&self) -> Vec<String> {
        self.commands().pop().expect("no commands received")
    }

    pub fn accepted_connections(&self) -> usize {
        self.state.lock().unwrap().accepted
    }

    /// Makes SET and HMSET answer with `status` instead of OK.
    pub fn override_ack(&self, status: &str) {
        self.state.lock().unwrap().ack_override = Some(status.to_string());
    }

    /// Raw string stored under `key`, bypassing any client prefix.
    pub fn string_value(&self, key: &str) -> Option<String> {
        match self.state.lock().unwrap().data.get(key) {
            Some(Value::Str(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.state.lock().unwrap().data.contains_key(key)
    }
}

fn serve(stream: TcpStream, state: Arc<Mutex<State>>) {
    let mut writer = stream.try_clone().expect("clone");
    let mut reader = BufReader::new(stream);
    let mut queue: Option<Vec<Vec<String>>> = None;
    let mut queue_failed = false;

    loop {
        let args = match read_command(&mut reader) {
            Ok(Some(args)) if !args.is_empty() => args,
            _ => return,
        };
        state.lock().unwrap().log.push(args.clone());
        let name = args[0].to_ascii_uppercase();

        let in_multi = queue.is_some();
        let reply = match (name.as_str(), in_multi) {
            ("MULTI", true) => Resp::Error("ERR MULTI calls can not be nested".into()),
            ("MULTI", false) => {
                queue = Some(Vec::new());
                queue_failed = false;
                ok()
            }
            ("EXEC", false) => Resp::Error("ERR EXEC without MULTI".into()),
            ("EXEC", true) => {
                let queued = queue.take().unwrap_or_default();
                if queue_failed {
                    Resp::Error(
                        "EXECABORT Transaction discarded because of previous errors.".into(),
                    )
                } else {
                    let mut guard = state.lock().unwrap();
                    Resp::Array(queued.iter().map(|cmd| apply(&mut guard, cmd)).collect())
                }
            }
            ("DISCARD", true) => {
                queue = None;
                ok()
            }
            (_, true) => {
                if is_known(&name) {
                    queue.get_or_insert_with(Vec::new).push(args);
                    Resp::Simple("QUEUED".into())
                } else {
                    queue_failed = true;
                    unknown(&name)
                }
            }
            (_, false) => apply(&mut state.lock().unwrap(), &args),
        };

        if write_resp(&mut writer, &reply).is_err() {
            return;
        }
    }
}

const KNOWN: [&str; 33] = [
    "PING", "AUTH", "SELECT", "KEYS", "GET", "SET", "EXISTS", "DEL", "TYPE", "EXPIRE", "TTL",
    "RPUSH", "LPOP", "RPOP", "LLEN", "LRANGE", "SADD", "SREM", "SISMEMBER", "SMEMBERS",
    "SCARD", "HSET", "HMSET", "HGET", "HGETALL", "HLEN", "HEXISTS", "HVALS", "HKEYS", "HDEL",
    "MULTI", "EXEC", "DISCARD",
];

fn is_known(name: &str) -> bool {
    KNOWN.contains(&name)
}

fn ok() -> Resp {
    Resp::Simple("OK".into())
}

fn unknown(name: &str) -> Resp {
    Resp::Error(format!("ERR unknown command '{name}'"))
}

fn wrong_type() -> Resp {
    Resp::Error("WRONGTYPE Operation against a key holding the wrong kind of value".into())
}

fn bulk(value: &str) -> Resp {
    Resp::Bulk(Some(value.to_string()))
}

fn bulks<'a>(values: impl IntoIterator<Item = &'a String>) -> Resp {
    Resp::Array(values.into_iter().map(|value| bulk(value)).collect())
}

fn apply(state: &mut State, args: &[String]) -> Resp {
    let name = args[0].to_ascii_uppercase();
    let argc = args.len() - 1;
    let arity_ok = match name.as_str() {
        "PING" => argc <= 1,
        "AUTH" => argc == 1 || argc == 2,
        "SELECT" | "KEYS" | "GET" | "TYPE" | "TTL" | "LPOP" | "RPOP" | "LLEN" | "SMEMBERS"
        | "SCARD" | "HGETALL" | "HLEN" | "HVALS" | "HKEYS" => argc == 1,
        "SET" | "EXPIRE" | "SISMEMBER" | "HGET" | "HEXISTS" => argc == 2,
        "LRANGE" | "HSET" => argc == 3,
        "EXISTS" | "DEL" => argc >= 1,
        "RPUSH" | "SADD" | "SREM" | "HDEL" => argc >= 2,
        "HMSET" => argc >= 3 && argc % 2 == 1,
        _ => return unknown(&name),
    };
    if !arity_ok {
        return Resp::Error(format!(
            "ERR wrong number of arguments for '{}' command",
            name.to_ascii_lowercase()
        ));
    }

    let key = args.get(1).cloned().unwrap_or_default();
    match name.as_str() {
        "PING" => match args.get(1) {
            Some(message) => bulk(message),
            None => Resp::Simple("PONG".into()),
        },
        "AUTH" | "SELECT" => ok(),
        "KEYS" => {
            let mut keys: Vec<&String> = state
                .data
                .keys()
                .filter(|candidate| glob_match(&key, candidate))
                .collect();
            keys.sort();
            bulks(keys)
        }
        "GET" => match state.data.get(&key) {
            None => Resp::Bulk(None),
            Some(Value::Str(value)) => bulk(value),
            Some(_) => wrong_type(),
        },
        "SET" => {
            state.data.insert(key.clone(), Value::Str(args[2].clone()));
            state.ttls.remove(&key);
            ack(state)
        }
        "EXISTS" => Resp::Integer(
            args[1..]
                .iter()
                .filter(|candidate| state.data.contains_key(*candidate))
                .count() as i64,
        ),
        "DEL" => {
            let mut removed = 0;
            for candidate in &args[1..] {
                if state.data.remove(candidate).is_some() {
                    removed += 1;
                }
                state.ttls.remove(candidate);
            }
            Resp::Integer(removed)
        }
        "TYPE" => Resp::Simple(
            match state.data.get(&key) {
                None => "none",
                Some(Value::Str(_)) => "string",
                Some(Value::List(_)) => "list",
                Some(Value::Set(_)) => "set",
                Some(Value::Hash(_)) => "hash",
            }
            .into(),
        ),
        "EXPIRE" => {
            let Ok(seconds) = args[2].parse::<i64>() else {
                return Resp::Error("ERR value is not an integer or out of range".into());
            };
            if state.data.contains_key(&key) {
                state.ttls.insert(key, seconds);
                Resp::Integer(1)
            } else {
                Resp::Integer(0)
            }
        }
        "TTL" => match (state.data.contains_key(&key), state.ttls.get(&key)) {
            (false, _) => Resp::Integer(-2),
            (true, None) => Resp::Integer(-1),
            (true, Some(seconds)) => Resp::Integer(*seconds),
        },
        "RPUSH" | "LPOP" | "RPOP" | "LLEN" | "LRANGE" => list_command(state, &name, &key, args),
        "SADD" | "SREM" | "SISMEMBER" | "SMEMBERS" | "SCARD" => {
            set_command(state, &name, &key, args)
        }
        _ => hash_command(state, &name, &key, args),
    }
}

fn ack(state: &State) -> Resp {
    match &state.ack_override {
        Some(status) => Resp::Simple(status.clone()),
        None => ok(),
    }
}

fn list_command(state: &mut State, name: &str, key: &str, args: &[String]) -> Resp {
    if name == "RPUSH" {
        let entry = state
            .data
            .entry(key.to_string())
            .or_insert_with(|| Value::List(VecDeque::new()));
        let Value::List(list) = entry else {
            return wrong_type();
        };
        list.extend(args[2..].iter().cloned());
        return Resp::Integer(list.len() as i64);
    }

    let list = match state.data.get_mut(key) {
        None => {
            return match name {
                "LLEN" => Resp::Integer(0),
                "LRANGE" => Resp::Array(Vec::new()),
                _ => Resp::Bulk(None),
            }
        }
        Some(Value::List(list)) => list,
        Some(_) => return wrong_type(),
    };

    let reply = match name {
        "LPOP" => Resp::Bulk(list.pop_front()),
        "RPOP" => Resp::Bulk(list.pop_back()),
        "LLEN" => Resp::Integer(list.len() as i64),
        _ => {
            let (Ok(start), Ok(stop)) = (args[2].parse::<i64>(), args[3].parse::<i64>()) else {
                return Resp::Error("ERR value is not an integer or out of range".into());
            };
            let len = list.len() as i64;
            let start = if start < 0 { (len + start).max(0) } else { start };
            let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
            if start > stop {
                Resp::Array(Vec::new())
            } else {
                bulks(list.range(start as usize..=stop as usize))
            }
        }
    };
    if list.is_empty() {
        state.data.remove(key);
    }
    reply
}

fn set_command(state: &mut State, name: &str, key: &str, args: &[String]) -> Resp {
    if name == "SADD" {
        let entry = state
            .data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()));
        let Value::Set(set) = entry else {
            return wrong_type();
        };
        let added = args[2..].iter().filter(|member| set.insert((*member).clone())).count();
        return Resp::Integer(added as i64);
    }

    let set = match state.data.get_mut(key) {
        None => {
            return match name {
                "SMEMBERS" => Resp::Array(Vec::new()),
                _ => Resp::Integer(0),
            }
        }
        Some(Value::Set(set)) => set,
        Some(_) => return wrong_type(),
    };

    let reply = match name {
        "SREM" => Resp::Integer(args[2..].iter().filter(|member| set.remove(*member)).count() as i64),
        "SISMEMBER" => Resp::Integer(set.contains(&args[2]) as i64),
        "SMEMBERS" => bulks(set.iter()),
        _ => Resp::Integer(set.len() as i64),
    };
    if set.is_empty() {
        state.data.remove(key);
    }
    reply
}

fn hash_command(state: &mut State, name: &str, key: &str, args: &[String]) -> Resp {
    if name == "HSET" || name == "HMSET" {
        let ack_reply = ack(state);
        let entry = state
            .data
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(BTreeMap::new()));
        let Value::Hash(hash) = entry else {
            return wrong_type();
        };
        let mut added = 0;
        for pair in args[2..].chunks(2) {
            if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
                added += 1;
            }
        }
        return if name == "HSET" {
            Resp::Integer(added)
        } else {
            ack_reply
        };
    }

    let hash = match state.data.get_mut(key) {
        None => {
            return match name {
                "HGET" => Resp::Bulk(None),
                "HGETALL" | "HVALS" | "HKEYS" => Resp::Array(Vec::new()),
                _ => Resp::Integer(0),
            }
        }
        Some(Value::Hash(hash)) => hash,
        Some(_) => return wrong_type(),
    };

    let reply = match name {
        "HGET" => Resp::Bulk(hash.get(&args[2]).cloned()),
        "HGETALL" => Resp::Array(
            hash.iter()
                .flat_map(|(field, value)| [bulk(field), bulk(value)])
                .collect(),
        ),
        "HLEN" => Resp::Integer(hash.len() as i64),
        "HEXISTS" => Resp::Integer(hash.contains_key(&args[2]) as i64),
        "HVALS" => bulks(hash.values()),
        "HKEYS" => bulks(hash.keys()),
        _ => Resp::Integer(
            args[2..]
                .iter()
                .filter(|field| hash.remove(*field).is_some())
                .count() as i64,
        ),
    };
    if hash.is_empty() {
        state.data.remove(key);
    }
    reply
}

/// Supports `*` wildcards anywhere in the pattern.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == candidate,
        Some((head, tail)) => {
            let Some(rest) = candidate.strip_prefix(head) else {
                return false;
            };
            (0..=rest.len())
                .filter(|idx| rest.is_char_boundary(*idx))
                .any(|idx| glob_match(tail, &rest[idx..]))
        }
    }
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<Vec<String>>> {
    let mut line = Vec::new();
    if read_line(reader, &mut line)?.is_none() {
        return Ok(None);
    }
    if line.first() != Some(&b'*') {
        return Err(invalid("expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line)?.ok_or_else(|| invalid("eof"))?;
        if line.first() != Some(&b'$') {
            return Err(invalid("expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data)?;
        data.truncate(len);
        args.push(String::from_utf8_lossy(&data).into_owned());
    }
    Ok(Some(args))
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<Option<()>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    if !buf.ends_with(b"\r\n") {
        return Err(invalid("invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(Some(()))
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| invalid("length"))
}

fn invalid(message: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message.to_string())
}

fn write_resp(stream: &mut TcpStream, reply: &Resp) -> std::io::Result<()> {
    let mut out = Vec::new();
    encode_resp(reply, &mut out);
    stream.write_all(&out)?;
    stream.flush()
}

fn encode_resp(reply: &Resp, out: &mut Vec<u8>) {
    match reply {
        Resp::Simple(text) => out.extend_from_slice(format!("+{text}\r\n").as_bytes()),
        Resp::Error(text) => out.extend_from_slice(format!("-{text}\r\n").as_bytes()),
        Resp::Integer(value) => out.extend_from_slice(format!(":{value}\r\n").as_bytes()),
        Resp::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
        Resp::Bulk(Some(data)) => {
            out.extend_from_slice(format!("${}\r\n{data}\r\n", data.len()).as_bytes())
        }
        Resp::Array(items) => {
            out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                encode_resp(item, out);
            }
        }
    }
}

/// Listener that answers every command with `raw` bytes, then hangs up.
pub fn spawn_raw_server(raw: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { return };
            let mut writer = stream.try_clone().expect("clone");
            let mut reader = BufReader::new(stream);
            if let Ok(Some(_)) = read_command(&mut reader) {
                let _ = writer.write_all(raw);
                let _ = writer.flush();
            }
        }
    });
    addr
}
