//! # Keyspace and Command Engine
//!
//! `Cache` owns the two pieces of shared state: the typed keyspace behind a
//! readers-writer lock and the expiry index behind its own mutex. Every
//! command validates arity, takes the narrowest lock it needs, and renders
//! its textual response.
//!
//! Lock order where both are needed: **expiry before keyspace**. The cleaner
//! takes them in the same order, so the pair can never deadlock.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use glob::Pattern;
use parking_lot::{Mutex, RwLock};

use lkv_common::{CacheError, CacheResult};

use crate::expiry::ExpiryIndex;
use crate::snapshot;
use crate::value::{kind_of, Fields, Map, Value};

const NIL: &str = "(nil)";
const OK: &str = "OK";

/// Which end of a list an operation works from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListEnd {
    Head,
    Tail,
}

/// Concurrent multi-type keyspace with per-key expiration.
pub struct Cache {
    pub(crate) fields: RwLock<Fields>,
    pub(crate) exps: Mutex<ExpiryIndex>,
    save_root: PathBuf,
}

impl Cache {
    /// Creates an empty cache saving snapshots under `./saves`.
    pub fn new() -> Self {
        Self::with_save_root("saves")
    }

    /// Creates an empty cache with an explicit snapshot directory.
    pub fn with_save_root(save_root: impl Into<PathBuf>) -> Self {
        Cache {
            fields: RwLock::new(Fields::default()),
            exps: Mutex::new(ExpiryIndex::new()),
            save_root: save_root.into(),
        }
    }

    /// Dispatches one command to its handler.
    ///
    /// Methods are case-sensitive uppercase. The returned string is the wire
    /// response without the `\r\n` terminator.
    pub fn handle_request(&self, method: &str, args: &[String]) -> CacheResult<String> {
        match method {
            "KEYS" => self.keys(args),
            "DEL" => self.del(args),
            "GET" => self.get(args),
            "SET" => self.set(args),
            "HGET" => self.hget(args),
            "HSET" => self.hset(args),
            "LPUSH" => self.lpush(args),
            "RPUSH" => self.rpush(args),
            "LPOP" => self.lpop(args),
            "RPOP" => self.rpop(args),
            "LGET" => self.lget(args),
            "LSET" => self.lset(args),
            "EXPIRE" => self.expire(args),
            "SAVE" => self.save(args),
            "LOAD" => self.load(args),
            _ => Err(CacheError::UnknownMethod),
        }
    }

    fn keys(&self, args: &[String]) -> CacheResult<String> {
        if args.len() != 1 {
            return Err(CacheError::Args("KEYS pattern"));
        }
        let pattern =
            Pattern::new(&args[0]).map_err(|err| CacheError::BadPattern(err.to_string()))?;

        let fields = self.fields.read();
        let mut lines = Vec::new();
        for key in fields.keys() {
            if pattern.matches(key) {
                lines.push(format!("{}) \"{}\"", lines.len() + 1, key));
            }
        }
        Ok(lines.join("\n"))
    }

    fn del(&self, args: &[String]) -> CacheResult<String> {
        if args.is_empty() {
            return Err(CacheError::Args("DEL key [key ...]"));
        }
        let mut fields = self.fields.write();
        let removed = args
            .iter()
            .filter(|key| fields.remove(key.as_str()).is_some())
            .count();
        Ok(integer(removed))
    }

    fn get(&self, args: &[String]) -> CacheResult<String> {
        if args.len() != 1 {
            return Err(CacheError::Args("GET key"));
        }
        let fields = self.fields.read();
        match fields.get(&args[0]) {
            None => Ok(NIL.to_string()),
            Some(Value::Str(value)) => Ok(value.clone()),
            Some(other) => Err(CacheError::WrongType(other.kind())),
        }
    }

    fn set(&self, args: &[String]) -> CacheResult<String> {
        if args.len() != 2 && args.len() != 4 {
            return Err(CacheError::Args("SET key value [EX seconds]"));
        }
        let seconds = if args.len() == 4 {
            if args[2] != "EX" {
                return Err(CacheError::Args("SET key value [EX seconds]"));
            }
            Some(parse_int(&args[3])?)
        } else {
            None
        };

        let mut exps = self.exps.lock();
        let mut fields = self.fields.write();
        fields.insert(args[0].clone(), Value::Str(args[1].clone()));
        // EX 0 leaves any armed expiration untouched.
        if let Some(seconds) = seconds {
            if seconds != 0 {
                exps.arm(&args[0], deadline_in(SystemTime::now(), seconds));
            }
        }
        Ok(OK.to_string())
    }

    fn expire(&self, args: &[String]) -> CacheResult<String> {
        if args.len() != 2 {
            return Err(CacheError::Args("EXPIRE key seconds"));
        }
        // Existence only; expiry applies to every value kind alike.
        if !self.fields.read().contains_key(&args[0]) {
            return Ok(integer(0));
        }
        let seconds = parse_int(&args[1])?;
        let mut exps = self.exps.lock();
        if seconds != 0 {
            exps.arm(&args[0], deadline_in(SystemTime::now(), seconds));
        } else {
            exps.cancel(&args[0]);
        }
        Ok(integer(1))
    }

    fn hset(&self, args: &[String]) -> CacheResult<String> {
        if args.len() < 3 || args.len() % 2 == 0 {
            return Err(CacheError::Args("HSET key field value [field value ...]"));
        }
        let mut fields = self.fields.write();
        let map = match fields
            .entry(args[0].clone())
            .or_insert_with(|| Value::Map(Map::default()))
        {
            Value::Map(map) => map,
            other => return Err(CacheError::WrongType(other.kind())),
        };
        let mut applied = 0;
        for pair in args[1..].chunks(2) {
            map.insert(pair[0].clone(), pair[1].clone());
            applied += 1;
        }
        Ok(integer(applied))
    }

    fn hget(&self, args: &[String]) -> CacheResult<String> {
        if args.len() != 2 {
            return Err(CacheError::Args("HGET key field"));
        }
        let fields = self.fields.read();
        match fields.get(&args[0]) {
            None => Ok(NIL.to_string()),
            Some(Value::Map(map)) => Ok(map
                .get(&args[1])
                .cloned()
                .unwrap_or_else(|| NIL.to_string())),
            Some(other) => Err(CacheError::WrongType(other.kind())),
        }
    }

    fn lpush(&self, args: &[String]) -> CacheResult<String> {
        self.push(args, ListEnd::Head, "LPUSH key element [element ...]")
    }

    fn rpush(&self, args: &[String]) -> CacheResult<String> {
        self.push(args, ListEnd::Tail, "RPUSH key element [element ...]")
    }

    fn push(&self, args: &[String], end: ListEnd, usage: &'static str) -> CacheResult<String> {
        if args.len() < 2 {
            return Err(CacheError::Args(usage));
        }
        let mut fields = self.fields.write();
        let list = match fields
            .entry(args[0].clone())
            .or_insert_with(|| Value::List(VecDeque::new()))
        {
            Value::List(list) => list,
            other => return Err(CacheError::WrongType(other.kind())),
        };
        for element in &args[1..] {
            match end {
                ListEnd::Head => list.push_front(element.clone()),
                ListEnd::Tail => list.push_back(element.clone()),
            }
        }
        Ok(integer(list.len()))
    }

    fn lpop(&self, args: &[String]) -> CacheResult<String> {
        self.pop(args, ListEnd::Head, "LPOP key [count]")
    }

    fn rpop(&self, args: &[String]) -> CacheResult<String> {
        self.pop(args, ListEnd::Tail, "RPOP key [count]")
    }

    fn pop(&self, args: &[String], end: ListEnd, usage: &'static str) -> CacheResult<String> {
        if args.is_empty() || args.len() > 3 {
            return Err(CacheError::Args(usage));
        }
        let mut fields = self.fields.write();
        let list = match fields.get_mut(&args[0]) {
            None => return Ok(NIL.to_string()),
            Some(Value::List(list)) => list,
            Some(other) => return Err(CacheError::WrongType(other.kind())),
        };
        let response = if args.len() > 1 {
            pop_span(list, &args[1..], end)?
        } else {
            match end {
                ListEnd::Head => list.pop_front(),
                ListEnd::Tail => list.pop_back(),
            }
            .expect("stored lists are never empty")
        };
        // A drained list does not linger as an empty key.
        if list.is_empty() {
            fields.remove(&args[0]);
        }
        Ok(response)
    }

    fn lset(&self, args: &[String]) -> CacheResult<String> {
        if args.len() != 3 {
            return Err(CacheError::Args("LSET key index element"));
        }
        let mut fields = self.fields.write();
        let list = match fields.get_mut(&args[0]) {
            Some(Value::List(list)) => list,
            other => return Err(CacheError::WrongType(kind_of(other.as_deref()))),
        };
        let index = parse_int(&args[1])?;
        let index = normalize_index(index, list.len()).ok_or(CacheError::IndexOutOfRange)?;
        list[index] = args[2].clone();
        Ok(OK.to_string())
    }

    fn lget(&self, args: &[String]) -> CacheResult<String> {
        if args.len() != 2 {
            return Err(CacheError::Args("LGET key index"));
        }
        let fields = self.fields.read();
        let list = match fields.get(&args[0]) {
            Some(Value::List(list)) => list,
            other => return Err(CacheError::WrongType(kind_of(other))),
        };
        let index = parse_int(&args[1])?;
        let index = normalize_index(index, list.len()).ok_or(CacheError::IndexOutOfRange)?;
        Ok(list[index].clone())
    }

    fn save(&self, args: &[String]) -> CacheResult<String> {
        if args.len() != 1 {
            return Err(CacheError::Args("SAVE name"));
        }
        // Serialize under the locks, write the file after releasing them.
        let blob = {
            let exps = self.exps.lock();
            let fields = self.fields.read();
            snapshot::encode(&fields, &exps)?
        };
        snapshot::write(&self.save_root, &args[0], &blob)?;
        Ok(OK.to_string())
    }

    fn load(&self, args: &[String]) -> CacheResult<String> {
        if args.len() != 1 {
            return Err(CacheError::Args("LOAD name"));
        }
        let blob = snapshot::read(&self.save_root, &args[0])?;
        let snapshot::Snapshot { fields, exps } = snapshot::decode(&blob)?;

        let mut current_exps = self.exps.lock();
        let mut current_fields = self.fields.write();
        *current_fields = fields;
        *current_exps = exps;
        Ok(OK.to_string())
    }
}

fn integer(value: usize) -> String {
    format!("(integer) {value}")
}

fn parse_int(arg: &str) -> CacheResult<i64> {
    arg.parse()
        .map_err(|_| CacheError::NotAnInteger(arg.to_string()))
}

/// Absolute deadline `seconds` away from `now`; negative counts land in the
/// past and are collected on the next sweep.
fn deadline_in(now: SystemTime, seconds: i64) -> SystemTime {
    if seconds >= 0 {
        now + Duration::from_secs(seconds as u64)
    } else {
        now - Duration::from_secs(seconds.unsigned_abs())
    }
}

/// Normalizes a possibly-negative index and clamps it into `[0, len - 1]`.
///
/// `None` means the list is empty, where every index is out of range. The
/// mapping is idempotent: normalizing a normalized index is a no-op.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let mut index = if index < 0 { len + index } else { index };
    if index < 0 {
        index = 0;
    }
    if index >= len {
        index = len - 1;
    }
    Some(index as usize)
}

/// Pops an inclusive span from a list and renders `i)element\n` lines in pop
/// order. `span` is either `[count]` or `[start, end]`.
fn pop_span(list: &mut VecDeque<String>, span: &[String], end: ListEnd) -> CacheResult<String> {
    let len = list.len();
    if len == 0 {
        return Err(CacheError::IndexOutOfRange);
    }

    let (start, stop) = if span.len() == 2 {
        let start =
            normalize_index(parse_int(&span[0])?, len).ok_or(CacheError::IndexOutOfRange)?;
        let stop =
            normalize_index(parse_int(&span[1])?, len).ok_or(CacheError::IndexOutOfRange)?;
        (start, stop)
    } else {
        let count = parse_int(&span[0])?;
        if count <= 0 {
            return Err(CacheError::NonPositiveCount);
        }
        let count = count as usize;
        match end {
            ListEnd::Head => (0, count.min(len) - 1),
            ListEnd::Tail => (len.saturating_sub(count), len - 1),
        }
    };
    if start > stop {
        return Err(CacheError::BadRange);
    }

    let mut rendered = String::new();
    for i in 0..=(stop - start) {
        let element = match end {
            ListEnd::Head => list.remove(start),
            ListEnd::Tail => list.remove(stop - i),
        }
        .expect("span is within bounds");
        rendered.push_str(&format!("{}){}\n", i + 1, element));
    }
    Ok(rendered)
}
