//! List commands: LPUSH, RPUSH, LPOP, RPOP, LRANGE, LLEN, LINDEX, LSET.

use std::collections::VecDeque;

use super::{key_str, parse_i64, register, to_cmdline, CommandTable, Db, Entity};
use crate::resp::Reply;

pub(super) fn register_all(table: &mut CommandTable) {
    register(table, "lpush", exec_lpush, -3);
    register(table, "rpush", exec_rpush, -3);
    register(table, "lpop", exec_lpop, 2);
    register(table, "rpop", exec_rpop, 2);
    register(table, "lrange", exec_lrange, 4);
    register(table, "llen", exec_llen, 2);
    register(table, "lindex", exec_lindex, 3);
    register(table, "lset", exec_lset, 4);
}

enum End {
    Front,
    Back,
}

/// LPUSH and RPUSH share everything but the end they push to. The values
/// are appended in argument order; a missing key gets a fresh list.
fn push(db: &Db, args: &[Vec<u8>], end: End, name: &str) -> Reply {
    let key = key_str(&args[0]);
    let result = db.data.with_shard(&key, |map| {
        let entry = map
            .entry(key.clone())
            .or_insert_with(|| Entity::List(VecDeque::new()));
        let Entity::List(list) = entry else {
            return Err(());
        };
        for value in &args[1..] {
            match end {
                End::Front => list.push_front(value.clone()),
                End::Back => list.push_back(value.clone()),
            }
        }
        Ok(list.len() as i64)
    });
    match result {
        Ok(len) => {
            db.add_aof(to_cmdline(name, args));
            Reply::Integer(len)
        }
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_lpush(db: &Db, args: &[Vec<u8>]) -> Reply {
    push(db, args, End::Front, "LPUSH")
}

fn exec_rpush(db: &Db, args: &[Vec<u8>]) -> Reply {
    push(db, args, End::Back, "RPUSH")
}

/// Pop one element; delete the key once the list empties.
fn pop(db: &Db, args: &[Vec<u8>], end: End, name: &str) -> Reply {
    let key = key_str(&args[0]);
    let result = db.data.with_shard(&key, |map| {
        let Some(entity) = map.get_mut(&key) else {
            return Ok(None);
        };
        let Entity::List(list) = entity else {
            return Err(());
        };
        let popped = match end {
            End::Front => list.pop_front(),
            End::Back => list.pop_back(),
        };
        if list.is_empty() {
            map.remove(&key);
        }
        Ok(popped)
    });
    match result {
        Ok(Some(value)) => {
            db.add_aof(to_cmdline(name, args));
            Reply::Bulk(value)
        }
        Ok(None) => Reply::Null,
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_lpop(db: &Db, args: &[Vec<u8>]) -> Reply {
    pop(db, args, End::Front, "LPOP")
}

fn exec_rpop(db: &Db, args: &[Vec<u8>]) -> Reply {
    pop(db, args, End::Back, "RPOP")
}

fn exec_lrange(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let Some(start) = parse_i64(&args[1]) else {
        return Reply::err("value is not an integer or out of range");
    };
    let Some(stop) = parse_i64(&args[2]) else {
        return Reply::err("value is not an integer or out of range");
    };

    match db.data.get(&key, |entity| match entity {
        Entity::List(list) => {
            let len = list.len() as i64;
            let mut start = if start < 0 { len + start } else { start };
            let mut stop = if stop < 0 { len + stop } else { stop };
            if start < 0 {
                start = 0;
            }
            if stop >= len {
                stop = len - 1;
            }
            if start > stop || start >= len {
                return Ok(Vec::new());
            }
            Ok(list
                .iter()
                .skip(start as usize)
                .take((stop - start + 1) as usize)
                .cloned()
                .collect())
        }
        _ => Err(()),
    }) {
        Some(Ok(elements)) if elements.is_empty() => Reply::EmptyMulti,
        Some(Ok(elements)) => Reply::multi(elements),
        Some(Err(())) => Reply::wrong_type(),
        None => Reply::EmptyMulti,
    }
}

fn exec_llen(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match db.data.get(&key, |entity| match entity {
        Entity::List(list) => Ok(list.len() as i64),
        _ => Err(()),
    }) {
        Some(Ok(len)) => Reply::Integer(len),
        Some(Err(())) => Reply::wrong_type(),
        None => Reply::Integer(0),
    }
}

fn exec_lindex(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let Some(index) = parse_i64(&args[1]) else {
        return Reply::err("value is not an integer or out of range");
    };
    match db.data.get(&key, |entity| match entity {
        Entity::List(list) => {
            let len = list.len() as i64;
            let index = if index < 0 { len + index } else { index };
            if index < 0 || index >= len {
                return Ok(None);
            }
            Ok(list.get(index as usize).cloned())
        }
        _ => Err(()),
    }) {
        Some(Ok(Some(value))) => Reply::Bulk(value),
        Some(Ok(None)) => Reply::Null,
        Some(Err(())) => Reply::wrong_type(),
        None => Reply::err("no such key"),
    }
}

fn exec_lset(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let Some(index) = parse_i64(&args[1]) else {
        return Reply::err("value is not an integer or out of range");
    };
    let value = &args[2];

    enum LsetOutcome {
        Done,
        NoSuchKey,
        OutOfRange,
        WrongType,
    }

    let outcome = db.data.with_shard(&key, |map| {
        let Some(entity) = map.get_mut(&key) else {
            return LsetOutcome::NoSuchKey;
        };
        let Entity::List(list) = entity else {
            return LsetOutcome::WrongType;
        };
        let len = list.len() as i64;
        let index = if index < 0 { len + index } else { index };
        if index < 0 || index >= len {
            return LsetOutcome::OutOfRange;
        }
        list[index as usize] = value.clone();
        LsetOutcome::Done
    });

    match outcome {
        LsetOutcome::Done => {
            db.add_aof(to_cmdline("LSET", args));
            Reply::Ok
        }
        LsetOutcome::NoSuchKey => Reply::err("no such key"),
        LsetOutcome::OutOfRange => Reply::err("index out of range"),
        LsetOutcome::WrongType => Reply::wrong_type(),
    }
}
