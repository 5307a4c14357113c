//! Sorted-set commands: ZADD, ZSCORE, ZCARD, ZRANGE, ZREM, ZCOUNT, ZRANK,
//! ZTYPE.

use super::{format_score, key_str, parse_f64, parse_i64, register, to_cmdline, CommandTable, Db, Entity};
use crate::datastruct::ZSet;
use crate::resp::Reply;

pub(super) fn register_all(table: &mut CommandTable) {
    register(table, "zadd", exec_zadd, -4);
    register(table, "zscore", exec_zscore, 3);
    register(table, "zcard", exec_zcard, 2);
    register(table, "zrange", exec_zrange, -4);
    register(table, "zrem", exec_zrem, -3);
    register(table, "zcount", exec_zcount, 4);
    register(table, "zrank", exec_zrank, 3);
    register(table, "ztype", exec_ztype, 2);
}

/// Read-only view of the sorted set at `key`.
fn view_zset<R>(db: &Db, key: &str, f: impl FnOnce(&ZSet) -> R) -> Result<Option<R>, ()> {
    match db.data.get(key, |entity| match entity {
        Entity::ZSet(zset) => Ok(f(zset)),
        _ => Err(()),
    }) {
        Some(Ok(result)) => Ok(Some(result)),
        Some(Err(())) => Err(()),
        None => Ok(None),
    }
}

fn exec_zadd(db: &Db, args: &[Vec<u8>]) -> Reply {
    // key followed by (score, member) pairs
    if (args.len() - 1) % 2 != 0 {
        return Reply::arg_num_err("zadd");
    }
    let key = key_str(&args[0]);

    let mut pairs = Vec::with_capacity((args.len() - 1) / 2);
    for chunk in args[1..].chunks(2) {
        let Some(score) = parse_f64(&chunk[0]) else {
            return Reply::err("value is not a valid float");
        };
        pairs.push((score, chunk[1].clone()));
    }

    let result = db.data.with_shard(&key, |map| {
        let entry = map
            .entry(key.clone())
            .or_insert_with(|| Entity::ZSet(ZSet::new()));
        let Entity::ZSet(zset) = entry else {
            return Err(());
        };
        let mut added = 0;
        for (score, member) in &pairs {
            if zset.add(member, *score) {
                added += 1;
            }
        }
        Ok(added)
    });

    match result {
        Ok(added) => {
            db.add_aof(to_cmdline("ZADD", args));
            Reply::Integer(added)
        }
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_zscore(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match view_zset(db, &key, |zset| zset.score(&args[1])) {
        Ok(Some(Some(score))) => Reply::Bulk(format_score(score)),
        Ok(_) => Reply::Null,
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_zcard(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match view_zset(db, &key, |zset| zset.len() as i64) {
        Ok(Some(len)) => Reply::Integer(len),
        Ok(None) => Reply::Integer(0),
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_zrange(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let Some(start) = parse_i64(&args[1]) else {
        return Reply::err("value is not an integer or out of range");
    };
    let Some(stop) = parse_i64(&args[2]) else {
        return Reply::err("value is not an integer or out of range");
    };
    let with_scores = match args.get(3) {
        Some(opt) if opt.eq_ignore_ascii_case(b"withscores") => true,
        Some(_) => return Reply::err("syntax error"),
        None => false,
    };

    match view_zset(db, &key, |zset| {
        let members = zset.range_by_rank(start, stop);
        if !with_scores {
            return members;
        }
        let mut items = Vec::with_capacity(members.len() * 2);
        for member in members {
            let score = zset.score(&member).unwrap_or_default();
            items.push(member);
            items.push(format_score(score));
        }
        items
    }) {
        Ok(Some(items)) if items.is_empty() => Reply::EmptyMulti,
        Ok(Some(items)) => Reply::multi(items),
        Ok(None) => Reply::EmptyMulti,
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_zrem(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let result = db.data.with_shard(&key, |map| {
        let Some(entity) = map.get_mut(&key) else {
            return Ok(0);
        };
        let Entity::ZSet(zset) = entity else {
            return Err(());
        };
        let mut removed = 0;
        for member in &args[1..] {
            if zset.remove(member) {
                removed += 1;
            }
        }
        if zset.is_empty() {
            map.remove(&key);
        }
        Ok(removed)
    });
    match result {
        Ok(removed) => {
            if removed > 0 {
                db.add_aof(to_cmdline("ZREM", args));
            }
            Reply::Integer(removed)
        }
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_zcount(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let Some(min) = parse_f64(&args[1]) else {
        return Reply::err("value is not a valid float");
    };
    let Some(max) = parse_f64(&args[2]) else {
        return Reply::err("value is not a valid float");
    };
    match view_zset(db, &key, |zset| zset.count(min, max) as i64) {
        Ok(Some(count)) => Reply::Integer(count),
        Ok(None) => Reply::Integer(0),
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_zrank(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match view_zset(db, &key, |zset| zset.rank(&args[1])) {
        Ok(Some(Some(rank))) => Reply::Integer(rank as i64),
        Ok(_) => Reply::Null,
        Err(()) => Reply::wrong_type(),
    }
}

/// Reports the encoding code of the sorted set at `key`: 0 for the compact
/// listpack form, 1 for the skiplist.
fn exec_ztype(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match view_zset(db, &key, |zset| zset.encoding().code()) {
        Ok(Some(code)) => Reply::Integer(code),
        Ok(None) => Reply::Null,
        Err(()) => Reply::wrong_type(),
    }
}
