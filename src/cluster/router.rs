//! Command classification for cluster routing.

/// How a command travels through the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Route {
    /// Hash the first key argument; execute locally or relay to its owner.
    Keyed,
    /// Always execute on this node.
    LocalOnly,
    /// Every key argument must hash to the same owner.
    SameShard,
    /// Send to every node and aggregate.
    Broadcast,
    /// Group key arguments by owner, relay one sub-command per owner and
    /// sum the integer replies.
    MultiKey,
}

pub(super) fn route_for(name: &str) -> Option<Route> {
    let route = match name {
        "ping" | "select" | "keys" => Route::LocalOnly,

        "rename" | "renamenx" | "sunion" | "sunionstore" | "sinter" | "sinterstore"
        | "sdiff" | "sdiffstore" => Route::SameShard,

        "flushdb" => Route::Broadcast,

        "del" | "exists" => Route::MultiKey,

        "get" | "set" | "setnx" | "getset" | "strlen" | "type" | "lpush" | "rpush" | "lpop"
        | "rpop" | "lrange" | "llen" | "lindex" | "lset" | "hset" | "hget" | "hexists"
        | "hdel" | "hlen" | "hgetall" | "hkeys" | "hvals" | "hmget" | "hmset" | "hsetnx"
        | "hencoding" | "sadd" | "scard" | "sismember" | "smembers" | "srem" | "spop"
        | "srandmember" | "zadd" | "zscore" | "zcard" | "zrange" | "zrem" | "zcount"
        | "zrank" | "ztype" => Route::Keyed,

        _ => return None,
    };
    Some(route)
}
