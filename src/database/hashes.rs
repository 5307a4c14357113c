//! Hash commands: HSET, HGET, HEXISTS, HDEL, HLEN, HGETALL, HKEYS, HVALS,
//! HMGET, HMSET, HSETNX, HENCODING.

use super::{key_str, register, to_cmdline, CommandTable, Db, Entity};
use crate::datastruct::Hash;
use crate::resp::Reply;

pub(super) fn register_all(table: &mut CommandTable) {
    register(table, "hset", exec_hset, 4);
    register(table, "hget", exec_hget, 3);
    register(table, "hexists", exec_hexists, 3);
    register(table, "hdel", exec_hdel, -3);
    register(table, "hlen", exec_hlen, 2);
    register(table, "hgetall", exec_hgetall, 2);
    register(table, "hkeys", exec_hkeys, 2);
    register(table, "hvals", exec_hvals, 2);
    register(table, "hmget", exec_hmget, -3);
    register(table, "hmset", exec_hmset, -4);
    register(table, "hsetnx", exec_hsetnx, 4);
    register(table, "hencoding", exec_hencoding, 2);
}

/// Read-only view of the hash at `key`. `Ok(None)` means the key does not
/// exist; `Err` means it holds another value kind.
fn view_hash<R>(db: &Db, key: &str, f: impl FnOnce(&Hash) -> R) -> Result<Option<R>, ()> {
    match db.data.get(key, |entity| match entity {
        Entity::Hash(hash) => Ok(f(hash)),
        _ => Err(()),
    }) {
        Some(Ok(result)) => Ok(Some(result)),
        Some(Err(())) => Err(()),
        None => Ok(None),
    }
}

/// Mutate the hash at `key`, creating it when absent; the key is removed
/// again if the hash is empty afterwards.
fn mutate_hash<R>(db: &Db, key: &str, f: impl FnOnce(&mut Hash) -> R) -> Result<R, ()> {
    db.data.with_shard(key, |map| {
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entity::Hash(Hash::new()));
        let Entity::Hash(hash) = entry else {
            return Err(());
        };
        let result = f(hash);
        if hash.is_empty() {
            map.remove(key);
        }
        Ok(result)
    })
}

fn exec_hset(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match mutate_hash(db, &key, |hash| hash.set(&args[1], &args[2])) {
        Ok(added) => {
            db.add_aof(to_cmdline("HSET", args));
            Reply::Integer(added as i64)
        }
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_hget(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match view_hash(db, &key, |hash| hash.get(&args[1]).map(<[u8]>::to_vec)) {
        Ok(Some(Some(value))) => Reply::Bulk(value),
        Ok(_) => Reply::Null,
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_hexists(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match view_hash(db, &key, |hash| hash.exists(&args[1])) {
        Ok(Some(true)) => Reply::Integer(1),
        Ok(_) => Reply::Integer(0),
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_hdel(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let result = db.data.with_shard(&key, |map| {
        let Some(entity) = map.get_mut(&key) else {
            return Ok(0);
        };
        let Entity::Hash(hash) = entity else {
            return Err(());
        };
        let mut deleted = 0;
        for field in &args[1..] {
            deleted += hash.delete(field);
        }
        if hash.is_empty() {
            map.remove(&key);
        }
        Ok(deleted)
    });
    match result {
        Ok(deleted) => {
            if deleted > 0 {
                db.add_aof(to_cmdline("HDEL", args));
            }
            Reply::Integer(deleted as i64)
        }
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_hlen(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match view_hash(db, &key, |hash| hash.len() as i64) {
        Ok(Some(len)) => Reply::Integer(len),
        Ok(None) => Reply::Integer(0),
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_hgetall(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match view_hash(db, &key, |hash| hash.pairs()) {
        Ok(Some(pairs)) => {
            let mut items = Vec::with_capacity(pairs.len() * 2);
            for (field, value) in pairs {
                items.push(field);
                items.push(value);
            }
            Reply::multi(items)
        }
        Ok(None) => Reply::EmptyMulti,
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_hkeys(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match view_hash(db, &key, |hash| hash.fields()) {
        Ok(Some(fields)) => Reply::multi(fields),
        Ok(None) => Reply::EmptyMulti,
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_hvals(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match view_hash(db, &key, |hash| hash.values()) {
        Ok(Some(values)) => Reply::multi(values),
        Ok(None) => Reply::EmptyMulti,
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_hmget(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let fields = &args[1..];
    match view_hash(db, &key, |hash| {
        fields
            .iter()
            .map(|field| hash.get(field).map(<[u8]>::to_vec))
            .collect::<Vec<Option<Vec<u8>>>>()
    }) {
        Ok(Some(values)) => Reply::Multi(values),
        Ok(None) => Reply::Multi(vec![None; fields.len()]),
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_hmset(db: &Db, args: &[Vec<u8>]) -> Reply {
    // key plus an even number of field/value arguments
    if args.len() % 2 == 0 {
        return Reply::arg_num_err("hmset");
    }
    let key = key_str(&args[0]);
    match mutate_hash(db, &key, |hash| {
        for pair in args[1..].chunks(2) {
            hash.set(&pair[0], &pair[1]);
        }
    }) {
        Ok(()) => {
            db.add_aof(to_cmdline("HMSET", args));
            Reply::Ok
        }
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_hsetnx(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match mutate_hash(db, &key, |hash| {
        if hash.exists(&args[1]) {
            0
        } else {
            hash.set(&args[1], &args[2])
        }
    }) {
        Ok(0) => Reply::Integer(0),
        Ok(added) => {
            db.add_aof(to_cmdline("HSETNX", args));
            Reply::Integer(added as i64)
        }
        Err(()) => Reply::wrong_type(),
    }
}

/// Reports the encoding code of the hash at `key`: 0 for the compact
/// listpack form, 1 for the hash table.
fn exec_hencoding(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match view_hash(db, &key, |hash| hash.encoding().code()) {
        Ok(Some(code)) => Reply::Integer(code),
        Ok(None) => Reply::Null,
        Err(()) => Reply::wrong_type(),
    }
}
