//! String commands: GET, SET, SETNX, GETSET, STRLEN.

use super::{key_str, register, to_cmdline, CommandTable, Db, Entity};
use crate::resp::Reply;

pub(super) fn register_all(table: &mut CommandTable) {
    register(table, "get", exec_get, 2);
    register(table, "set", exec_set, 3);
    register(table, "setnx", exec_setnx, 3);
    register(table, "getset", exec_getset, 3);
    register(table, "strlen", exec_strlen, 2);
}

fn exec_get(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match db.data.get(&key, |entity| match entity {
        Entity::Str(value) => Ok(value.clone()),
        _ => Err(()),
    }) {
        Some(Ok(value)) => Reply::Bulk(value),
        Some(Err(())) => Reply::wrong_type(),
        None => Reply::Null,
    }
}

fn exec_set(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    db.data.put(&key, Entity::Str(args[1].clone()));
    db.add_aof(to_cmdline("SET", args));
    Reply::Ok
}

fn exec_setnx(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let result = db.data.put_if_absent(&key, Entity::Str(args[1].clone()));
    if result > 0 {
        db.add_aof(to_cmdline("SETNX", args));
    }
    Reply::Integer(result as i64)
}

fn exec_getset(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    let previous = db.data.with_shard(&key, |map| match map.get(&key) {
        Some(Entity::Str(_)) => {
            let old = map.insert(key.clone(), Entity::Str(args[1].clone()));
            if let Some(Entity::Str(value)) = old {
                Ok(Some(value))
            } else {
                Ok(None)
            }
        }
        Some(_) => Err(()),
        None => {
            map.insert(key.clone(), Entity::Str(args[1].clone()));
            Ok(None)
        }
    });
    match previous {
        Ok(old) => {
            db.add_aof(to_cmdline("GETSET", args));
            match old {
                Some(value) => Reply::Bulk(value),
                None => Reply::Null,
            }
        }
        Err(()) => Reply::wrong_type(),
    }
}

fn exec_strlen(db: &Db, args: &[Vec<u8>]) -> Reply {
    let key = key_str(&args[0]);
    match db.data.get(&key, |entity| match entity {
        Entity::Str(value) => Ok(value.len() as i64),
        _ => Err(()),
    }) {
        Some(Ok(len)) => Reply::Integer(len),
        Some(Err(())) => Reply::wrong_type(),
        None => Reply::Null,
    }
}
