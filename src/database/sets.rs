//! Set commands: SADD, SCARD, SISMEMBER, SMEMBERS, SREM, SPOP,
//! SRANDMEMBER and the algebraic SUNION/SINTER/SDIFF with STORE variants.

use std::collections::HashSet;

use super::{key_str, parse_i64, register, to_cmdline, CommandTable, Db, Entity};
use crate::datastruct::Set;
use crate::resp::Reply;

pub(super) fn register_all(table: &mut CommandTable) {
    register(table, "sadd", exec_sadd, -3);
    register(table, "scard", exec_scard, 2);
    register(table, "sismember", exec_sismember, 3);
    register(table, "smembers", exec_smembers, 2);
    register(table, "srem", exec_srem, -3);
    register(table, "spop", exec_spop, -2);
    register(table, "srandmember", exec_srandmember, -2);
    register(table, "sunion", exec_sunion, -2);
    register(table, "sunionstore", exec_sunionstore, -3);
    register(table, "sinter", exec_sinter, -2);
    register(table, "sinterstore", exec_sinterstore, -3);
    register(table, "sdiff", exec_sdiff, -2);
    register(table, "sdiffstore", exec_sdiffstore, -3);
}

/// Members of the set at `key`; `Ok(None)` when the key does not exist.
fn members_of(db: &Db, key: &str) -> Result<Option<Vec<Vec<u8>>>, ()> {
    match db.data.get(key, |entity| match entity {
        Entity::Set(set) => Ok(set.members()),
        _ => Err(()),
    }) {
        Some(Ok(members)) => Ok(Some(members)),
        Some(Err(())) => Err(()),
        None => Ok(None),
    }
}

fn exec_sadd(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let result = db.data.with_shard(&key, |map| {
        let entry = map
            .entry(key.clone())
            .or_insert_with(|| Entity::Set(Set::new()));
        let Entity::Set(set) = entry else {
            return Err(());
        };
        let mut added = 0;
        for member in &args[1..] {
            added += set.add(member);
        }
        Ok(added)
    });
    match result {
        Ok(added) => {
            db.add_aof(to_cmdline("SADD", args));
            Reply::Integer(added as i64)
        }
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_scard(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match db.data.get(&key, |entity| match entity {
        Entity::Set(set) => Ok(set.len() as i64),
        _ => Err(()),
    }) {
        Some(Ok(len)) => Reply::Integer(len),
        Some(Err(())) => Reply::wrong_type(),
        None => Reply::Integer(0),
    }
}

fn exec_sismember(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match db.data.get(&key, |entity| match entity {
        Entity::Set(set) => Ok(set.contains(&args[1])),
        _ => Err(()),
    }) {
        Some(Ok(true)) => Reply::Integer(1),
        Some(Ok(false)) | None => Reply::Integer(0),
        Some(Err(())) => Reply::wrong_type(),
    }
}

fn exec_smembers(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match members_of(db, &key) {
        Ok(Some(members)) => Reply::multi(members),
        Ok(None) => Reply::EmptyMulti,
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_srem(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let result = db.data.with_shard(&key, |map| {
        let Some(entity) = map.get_mut(&key) else {
            return Ok(0);
        };
        let Entity::Set(set) = entity else {
            return Err(());
        };
        let mut removed = 0;
        for member in &args[1..] {
            removed += set.remove(member);
        }
        if set.is_empty() {
            map.remove(&key);
        }
        Ok(removed)
    });
    match result {
        Ok(removed) => {
            if removed > 0 {
                db.add_aof(to_cmdline("SREM", args));
            }
            Reply::Integer(removed as i64)
        }
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_spop(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let explicit_count = args.len() >= 2;
    let count = if explicit_count {
        match parse_i64(&args[1]) {
            Some(n) if n >= 0 => n as usize,
            _ => return Reply::err("value is not an integer or out of range"),
        }
    } else {
        1
    };

    let result = db.data.with_shard(&key, |map| {
        let Some(entity) = map.get_mut(&key) else {
            return Ok(None);
        };
        let Entity::Set(set) = entity else {
            return Err(());
        };
        if set.is_empty() || count == 0 {
            return Ok(Some(Vec::new()));
        }
        let picked = set.random_distinct_members(count.min(set.len()));
        for member in &picked {
            set.remove(member);
        }
        if set.is_empty() {
            map.remove(&key);
        }
        Ok(Some(picked))
    });

    match result {
        Ok(None) => Reply::EmptyBulk,
        Ok(Some(picked)) if picked.is_empty() => {
            if count == 0 {
                Reply::EmptyMulti
            } else {
                Reply::EmptyBulk
            }
        }
        Ok(Some(picked)) => {
            // the chosen members are random, so the log records the
            // equivalent deterministic removal
            let mut srem_args = vec![args[0].clone()];
            srem_args.extend(picked.iter().cloned());
            db.add_aof(to_cmdline("SREM", &srem_args));
            if !explicit_count {
                Reply::Bulk(picked.into_iter().next().unwrap_or_default())
            } else {
                Reply::multi(picked)
            }
        }
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_srandmember(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let explicit_count = args.len() >= 2;
    let (count, with_replacement) = if explicit_count {
        match parse_i64(&args[1]) {
            Some(n) if n < 0 => ((-n) as usize, true),
            Some(n) => (n as usize, false),
            None => return Reply::err("value is not an integer or out of range"),
        }
    } else {
        (1, false)
    };

    let picked = db.data.get(&key, |entity| match entity {
        Entity::Set(set) => {
            if with_replacement {
                Ok(set.random_members(count))
            } else {
                Ok(set.random_distinct_members(count))
            }
        }
        _ => Err(()),
    });

    match picked {
        Some(Ok(members)) => {
            if !explicit_count {
                match members.into_iter().next() {
                    Some(member) => Reply::Bulk(member),
                    None => Reply::EmptyBulk,
                }
            } else if members.is_empty() {
                Reply::EmptyMulti
            } else {
                Reply::multi(members)
            }
        }
        Some(Err(())) => Reply::wrong_type(),
        None => Reply::EmptyBulk,
    }
}

/// Union of the sets at `keys`; missing keys contribute nothing.
fn union_of(db: &Db, keys: &[Vec<u8>]) -> Result<Set, ()> {
    let mut result = Set::new();
    for key in keys {
        if let Some(members) = members_of(db, &key_str(key))? {
            for member in members {
                result.add(&member);
            }
        }
    }
    Ok(result)
}

/// Intersection of the sets at `keys`; short-circuits to empty as soon as
/// the accumulator empties.
fn inter_of(db: &Db, keys: &[Vec<u8>]) -> Result<Set, ()> {
    let mut result = Set::new();
    let Some(first) = members_of(db, &key_str(&keys[0]))? else {
        return Ok(result);
    };
    for member in first {
        result.add(&member);
    }
    for key in &keys[1..] {
        let Some(members) = members_of(db, &key_str(key))? else {
            return Ok(Set::new());
        };
        let current: HashSet<Vec<u8>> = members.into_iter().collect();
        for member in result.members() {
            if !current.contains(&member) {
                result.remove(&member);
            }
        }
        if result.is_empty() {
            return Ok(result);
        }
    }
    Ok(result)
}

/// Members of the first set minus the members of the rest.
fn diff_of(db: &Db, keys: &[Vec<u8>]) -> Result<Set, ()> {
    let mut result = Set::new();
    let Some(first) = members_of(db, &key_str(&keys[0]))? else {
        return Ok(result);
    };
    for member in first {
        result.add(&member);
    }
    for key in &keys[1..] {
        if let Some(members) = members_of(db, &key_str(key))? {
            for member in members {
                result.remove(&member);
            }
        }
        if result.is_empty() {
            break;
        }
    }
    Ok(result)
}

fn algebra_reply(result: Result<Set, ()>) -> Reply {
    match result {
        Ok(set) if set.is_empty() => Reply::EmptyMulti,
        Ok(set) => Reply::multi(set.members()),
        Err(()) => Reply::wrong_type(),
    }
}

/// Replace `dest` with `result`; an empty result deletes `dest` instead.
fn algebra_store(db: &Db, name: &str, args: &[Vec<u8>], result: Result<Set, ()>) -> Reply {
    match result {
        Ok(set) => {
            let dest = key_str(&args[0]);
            let len = set.len();
            if len == 0 {
                db.data.remove(&dest);
            } else {
                db.data.put(&dest, Entity::Set(set));
            }
            db.add_aof(to_cmdline(name, args));
            Reply::Integer(len as i64)
        }
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_sunion(db: &Db, args: &[Vec<u8>]) -> Reply {
    algebra_reply(union_of(db, args))
}

fn exec_sunionstore(db: &Db, args: &[Vec<u8>]) -> Reply {
    algebra_store(db, "SUNIONSTORE", args, union_of(db, &args[1..]))
}

fn exec_sinter(db: &Db, args: &[Vec<u8>]) -> Reply {
    algebra_reply(inter_of(db, args))
}

fn exec_sinterstore(db: &Db, args: &[Vec<u8>]) -> Reply {
    algebra_store(db, "SINTERSTORE", args, inter_of(db, &args[1..]))
}

fn exec_sdiff(db: &Db, args: &[Vec<u8>]) -> Reply {
    algebra_reply(diff_of(db, args))
}

fn exec_sdiffstore(db: &Db, args: &[Vec<u8>]) -> Reply {
    algebra_store(db, "SDIFFSTORE", args, diff_of(db, &args[1..]))
}
