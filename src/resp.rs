//! RESP reply types and their canonical wire encoding.
//!
//! Every reply the server can produce is a [`Reply`] variant; `to_bytes`
//! yields the exact byte form put on the wire. Null bulk (`$-1`) and empty
//! bulk (`$0`) are distinct replies, as are null array (`*-1`) and empty
//! array (`*0`).

/// A single RESP frame, either produced by an executor as a reply or
/// decoded from the wire by the streaming parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `+OK`
    Ok,
    /// `+PONG`
    Pong,
    /// Null bulk string, `$-1`
    Null,
    /// Empty bulk string, `$0`
    EmptyBulk,
    /// Empty multi-bulk, `*0`
    EmptyMulti,
    /// Null multi-bulk, `*-1`
    NullMulti,
    /// Nothing is written to the connection at all.
    NoReply,
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Vec<u8>),
    /// Multi-bulk of bulk strings; `None` entries encode as null bulks.
    Multi(Vec<Option<Vec<u8>>>),
}

impl Reply {
    /// Standard error reply, prefixed with `ERR`.
    pub fn err(msg: impl Into<String>) -> Reply {
        Reply::Error(format!("ERR {}", msg.into()))
    }

    pub fn wrong_type() -> Reply {
        Reply::Error(
            "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
        )
    }

    pub fn arg_num_err(cmd: &str) -> Reply {
        Reply::err(format!("wrong number of arguments for '{cmd}' command"))
    }

    pub fn unknown_cmd(cmd: &str) -> Reply {
        Reply::err(format!("unknown command '{cmd}'"))
    }

    /// Multi-bulk from owned byte strings, no null entries.
    pub fn multi(items: Vec<Vec<u8>>) -> Reply {
        Reply::Multi(items.into_iter().map(Some).collect())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// The error text of an `Error` reply.
    pub fn error_text(&self) -> Option<&str> {
        match self {
            Reply::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// The arguments of a multi-bulk frame, with null entries flattened to
    /// empty strings. Used to turn a parsed frame into a command line.
    pub fn into_cmdline(self) -> Option<Vec<Vec<u8>>> {
        match self {
            Reply::Multi(items) => Some(
                items
                    .into_iter()
                    .map(|item| item.unwrap_or_default())
                    .collect(),
            ),
            Reply::EmptyMulti => Some(Vec::new()),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Reply::Ok => b"+OK\r\n".to_vec(),
            Reply::Pong => b"+PONG\r\n".to_vec(),
            Reply::Null => b"$-1\r\n".to_vec(),
            Reply::EmptyBulk => b"$0\r\n\r\n".to_vec(),
            Reply::EmptyMulti => b"*0\r\n".to_vec(),
            Reply::NullMulti => b"*-1\r\n".to_vec(),
            Reply::NoReply => Vec::new(),
            Reply::Simple(text) => format!("+{text}\r\n").into_bytes(),
            Reply::Error(msg) => format!("-{msg}\r\n").into_bytes(),
            Reply::Integer(n) => format!(":{n}\r\n").into_bytes(),
            Reply::Bulk(data) => {
                let mut out = Vec::with_capacity(data.len() + 16);
                append_bulk(&mut out, Some(data));
                out
            }
            Reply::Multi(items) => {
                let mut out = Vec::new();
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    append_bulk(&mut out, item.as_deref());
                }
                out
            }
        }
    }
}

fn append_bulk(out: &mut Vec<u8>, data: Option<&[u8]>) {
    match data {
        None => out.extend_from_slice(b"$-1\r\n"),
        Some(data) => {
            out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Reply;

    #[test]
    fn test_encode_canonical_forms() {
        let test_cases: Vec<(Reply, &[u8])> = vec![
            (Reply::Ok, b"+OK\r\n"),
            (Reply::Pong, b"+PONG\r\n"),
            (Reply::Null, b"$-1\r\n"),
            (Reply::EmptyBulk, b"$0\r\n\r\n"),
            (Reply::EmptyMulti, b"*0\r\n"),
            (Reply::NullMulti, b"*-1\r\n"),
            (Reply::NoReply, b""),
            (Reply::Simple("hello".to_string()), b"+hello\r\n"),
            (Reply::Error("ERR oops".to_string()), b"-ERR oops\r\n"),
            (Reply::Integer(42), b":42\r\n"),
            (Reply::Integer(-7), b":-7\r\n"),
            (Reply::Bulk(b"bar".to_vec()), b"$3\r\nbar\r\n"),
            (Reply::Bulk(Vec::new()), b"$0\r\n\r\n"),
            (
                Reply::multi(vec![b"a".to_vec(), b"bc".to_vec()]),
                b"*2\r\n$1\r\na\r\n$2\r\nbc\r\n",
            ),
            (
                Reply::Multi(vec![Some(b"x".to_vec()), None]),
                b"*2\r\n$1\r\nx\r\n$-1\r\n",
            ),
        ];

        for (reply, expected) in test_cases {
            assert_eq!(reply.to_bytes(), expected, "encoding {:?}", reply);
        }
    }

    #[test]
    fn test_error_helpers() {
        assert_eq!(
            Reply::arg_num_err("get").to_bytes(),
            b"-ERR wrong number of arguments for 'get' command\r\n"
        );
        assert_eq!(
            Reply::unknown_cmd("frob").to_bytes(),
            b"-ERR unknown command 'frob'\r\n"
        );
        assert!(Reply::wrong_type().is_error());
        assert!(!Reply::Ok.is_error());
    }

    #[test]
    fn test_into_cmdline() {
        let frame = Reply::multi(vec![b"SET".to_vec(), b"k".to_vec(), b"v".to_vec()]);
        assert_eq!(
            frame.into_cmdline(),
            Some(vec![b"SET".to_vec(), b"k".to_vec(), b"v".to_vec()])
        );
        assert_eq!(Reply::EmptyMulti.into_cmdline(), Some(vec![]));
        assert_eq!(Reply::Integer(1).into_cmdline(), None);
    }
}
