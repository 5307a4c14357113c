//! Per-database command engine.
//!
//! A [`Db`] owns one concurrent dictionary of [`Entity`] values and a
//! mutation sink feeding the AOF pipeline. Commands are looked up in a
//! process-wide table built once at startup; each entry carries an executor
//! and an arity rule. Executors are synchronous and never suspend.

mod hashes;
mod keys;
mod lists;
mod sets;
mod standalone;
mod strings;
mod zsets;

use std::collections::{HashMap, VecDeque};
use std::sync::OnceLock;

pub use standalone::StandaloneServer;

use async_trait::async_trait;

use crate::connection::ClientConn;
use crate::datastruct::{Hash, Set, ZSet};
use crate::dict::Dict;
use crate::resp::Reply;

/// A command line: the command name followed by its arguments.
pub type CmdLine = Vec<Vec<u8>>;

/// The payload stored at a key. Exactly one of the five value kinds;
/// executors match on the tag and reply with a wrong-type error otherwise.
#[derive(Debug, Clone)]
pub enum Entity {
    Str(Vec<u8>),
    List(VecDeque<Vec<u8>>),
    Hash(Hash),
    Set(Set),
    ZSet(ZSet),
}

impl Entity {
    pub fn type_name(&self) -> &'static str {
        match self {
            Entity::Str(_) => "string",
            Entity::List(_) => "list",
            Entity::Hash(_) => "hash",
            Entity::Set(_) => "set",
            Entity::ZSet(_) => "zset",
        }
    }
}

/// The common interface of the standalone container and the cluster router.
#[async_trait]
pub trait DataServer: Send + Sync {
    async fn exec(&self, conn: &ClientConn, cmdline: &[Vec<u8>]) -> Reply;
    fn after_client_close(&self, conn: &ClientConn);
    async fn close(&self);
}

pub type ExecFn = fn(&Db, &[Vec<u8>]) -> Reply;

pub struct Command {
    pub exec: ExecFn,
    /// Non-negative: exact argument count including the command name.
    /// Negative: at least `-arity` arguments.
    pub arity: i32,
}

type CommandTable = HashMap<&'static str, Command>;

fn command_table() -> &'static CommandTable {
    static TABLE: OnceLock<CommandTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = CommandTable::new();
        strings::register_all(&mut table);
        lists::register_all(&mut table);
        hashes::register_all(&mut table);
        sets::register_all(&mut table);
        zsets::register_all(&mut table);
        keys::register_all(&mut table);
        table
    })
}

fn register(table: &mut CommandTable, name: &'static str, exec: ExecFn, arity: i32) {
    table.insert(name, Command { exec, arity });
}

pub fn validate_arity(arity: i32, cmdline_len: usize) -> bool {
    if arity >= 0 {
        cmdline_len == arity as usize
    } else {
        cmdline_len >= (-arity) as usize
    }
}

type AofSink = Box<dyn Fn(CmdLine) + Send + Sync>;

pub struct Db {
    pub index: usize,
    pub(crate) data: Dict<Entity>,
    aof_sink: OnceLock<AofSink>,
}

impl Db {
    pub fn new(index: usize) -> Self {
        Db {
            index,
            data: Dict::new(),
            aof_sink: OnceLock::new(),
        }
    }

    /// Install the mutation sink. May be called at most once; before that
    /// every mutation record is dropped.
    pub fn set_aof_sink(&self, sink: AofSink) {
        let _ = self.aof_sink.set(sink);
    }

    pub(crate) fn add_aof(&self, line: CmdLine) {
        if let Some(sink) = self.aof_sink.get() {
            sink(line);
        }
    }

    /// Execute one command line against this database.
    pub fn exec(&self, cmdline: &[Vec<u8>]) -> Reply {
        let name = String::from_utf8_lossy(&cmdline[0]).to_lowercase();
        let Some(cmd) = command_table().get(name.as_str()) else {
            return Reply::unknown_cmd(&name);
        };
        if !validate_arity(cmd.arity, cmdline.len()) {
            return Reply::arg_num_err(&name);
        }
        (cmd.exec)(self, &cmdline[1..])
    }

    pub fn flush(&self) {
        self.data.clear();
    }
}

/// Dictionary keys are strings; command arguments arrive as raw bytes.
pub(crate) fn key_str(arg: &[u8]) -> String {
    String::from_utf8_lossy(arg).into_owned()
}

pub(crate) fn to_cmdline(name: &str, args: &[Vec<u8>]) -> CmdLine {
    let mut line = Vec::with_capacity(args.len() + 1);
    line.push(name.as_bytes().to_vec());
    line.extend(args.iter().cloned());
    line
}

pub(crate) fn parse_i64(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse::<i64>().ok()
}

pub(crate) fn parse_f64(arg: &[u8]) -> Option<f64> {
    std::str::from_utf8(arg).ok()?.parse::<f64>().ok()
}

/// Scores print the way redis prints them: integral values without a
/// trailing fraction.
pub(crate) fn format_score(score: f64) -> Vec<u8> {
    format!("{score}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::{validate_arity, Db, Entity};
    use crate::resp::Reply;

    fn cmdline(parts: &[&str]) -> Vec<Vec<u8>> {
        parts.iter().map(|p| p.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_validate_arity() {
        let test_cases = vec![
            (2, 2, true),
            (2, 3, false),
            (2, 1, false),
            (-3, 3, true),
            (-3, 5, true),
            (-3, 2, false),
        ];
        for (arity, len, expected) in test_cases {
            assert_eq!(validate_arity(arity, len), expected, "arity {arity} len {len}");
        }
    }

    #[test]
    fn test_unknown_command() {
        let db = Db::new(0);
        let reply = db.exec(&cmdline(&["NOSUCHCMD", "a"]));
        assert_eq!(reply.to_bytes(), b"-ERR unknown command 'nosuchcmd'\r\n");
    }

    #[test]
    fn test_arity_violation() {
        let db = Db::new(0);
        let reply = db.exec(&cmdline(&["GET"]));
        assert_eq!(
            reply.to_bytes(),
            b"-ERR wrong number of arguments for 'get' command\r\n"
        );
    }

    #[test]
    fn test_command_name_is_case_insensitive() {
        let db = Db::new(0);
        assert_eq!(db.exec(&cmdline(&["set", "k", "v"])), Reply::Ok);
        assert_eq!(
            db.exec(&cmdline(&["GeT", "k"])),
            Reply::Bulk(b"v".to_vec())
        );
    }

    #[test]
    fn test_entity_type_names() {
        assert_eq!(Entity::Str(vec![]).type_name(), "string");
        assert_eq!(Entity::List(Default::default()).type_name(), "list");
        assert_eq!(Entity::Hash(Default::default()).type_name(), "hash");
        assert_eq!(Entity::Set(Default::default()).type_name(), "set");
        assert_eq!(Entity::ZSet(Default::default()).type_name(), "zset");
    }
}
