//! Key-level commands: KEYS, PING, DEL, EXISTS, FLUSHDB, TYPE, RENAME,
//! RENAMENX.

use super::{key_str, register, to_cmdline, CommandTable, Db, Entity};
use crate::resp::Reply;
use crate::wildcard::Pattern;

pub(super) fn register_all(table: &mut CommandTable) {
    register(table, "keys", exec_keys, 2);
    register(table, "ping", exec_ping, 1);
    register(table, "del", exec_del, -2);
    register(table, "exists", exec_exists, -2);
    register(table, "flushdb", exec_flushdb, -1);
    register(table, "type", exec_type, 2);
    register(table, "rename", exec_rename, 3);
    register(table, "renamenx", exec_renamenx, 3);
}

fn exec_ping(_db: &Db, _args: &[Vec<u8>]) -> Reply {
    Reply::Pong
}

fn exec_keys(db: &Db, args: &[Vec<u8>]) -> Reply {
    let pattern = Pattern::compile(&args[0]);
    let mut matched = Vec::new();
    db.data.for_each(|key, _| {
        if pattern.matches(key.as_bytes()) {
            matched.push(key.as_bytes().to_vec());
        }
        true
    });
    if matched.is_empty() {
        Reply::EmptyMulti
    } else {
        Reply::multi(matched)
    }
}

fn exec_del(db: &Db, args: &[Vec<u8>]) -> Reply {
    let mut deleted = 0;
    for arg in args {
        deleted += db.data.remove(&key_str(arg));
    }
    if deleted > 0 {
        db.add_aof(to_cmdline("DEL", args));
    }
    Reply::Integer(deleted as i64)
}

fn exec_exists(db: &Db, args: &[Vec<u8>]) -> Reply {
    let mut hits = 0;
    for arg in args {
        if db.data.contains(&key_str(arg)) {
            hits += 1;
        }
    }
    Reply::Integer(hits)
}

fn exec_flushdb(db: &Db, args: &[Vec<u8>]) -> Reply {
    db.flush();
    db.add_aof(to_cmdline("FLUSHDB", args));
    Reply::Ok
}

fn exec_type(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match db.data.get(&key, Entity::type_name) {
        Some(name) => Reply::Simple(name.to_string()),
        None => Reply::Simple("none".to_string()),
    }
}

fn exec_rename(db: &Db, args: &[Vec<u8>]) -> Reply {
    let src = key_str(&args[0]);
    let dst = key_str(&args[1]);
    let Some(entity) = db.data.with_shard(&src, |map| map.remove(&src)) else {
        return Reply::err("no such key");
    };
    db.data.put(&dst, entity);
    db.add_aof(to_cmdline("RENAME", args));
    Reply::Ok
}

fn exec_renamenx(db: &Db, args: &[Vec<u8>]) -> Reply {
    let src = key_str(&args[0]);
    let dst = key_str(&args[1]);
    if !db.data.contains(&src) {
        return Reply::err("no such key");
    }
    if db.data.contains(&dst) {
        return Reply::Integer(0);
    }
    let Some(entity) = db.data.with_shard(&src, |map| map.remove(&src)) else {
        return Reply::err("no such key");
    };
    db.data.put(&dst, entity);
    db.add_aof(to_cmdline("RENAMENX", args));
    Reply::Integer(1)
}
