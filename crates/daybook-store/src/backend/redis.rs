// ABOUTME: Redis implementation of the backend seam using a multiplexed async connection.
// ABOUTME: Classifies redis errors into link failures versus rejected commands.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::{
    Client, Cmd, ConnectionAddr, ConnectionInfo, FromRedisValue, RedisConnectionInfo, RedisError,
};
use async_trait::async_trait;

use super::{BackendError, Connection, Connector};

const SCAN_BATCH: usize = 200;

/// Where and how to reach the Redis server.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub connect_timeout: Duration,
    /// Longest wait for a reply to one command before the link counts as lost.
    pub response_timeout: Duration,
}

/// Opens multiplexed connections to one Redis server.
pub struct RedisConnector {
    client: Client,
    address: String,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl RedisConnector {
    pub fn new(settings: &RedisSettings) -> Result<Self, BackendError> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(settings.host.clone(), settings.port),
            redis: RedisConnectionInfo {
                password: settings.password.clone(),
                ..Default::default()
            },
        };
        let client = Client::open(info).map_err(classify)?;

        Ok(Self {
            client,
            address: format!("{}:{}", settings.host, settings.port),
            connect_timeout: settings.connect_timeout,
            response_timeout: settings.response_timeout,
        })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&self) -> Result<Arc<dyn Connection>, BackendError> {
        let conn = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            BackendError::Connection(format!(
                "timed out after {}ms connecting to {}",
                self.connect_timeout.as_millis(),
                self.address
            ))
        })?
        .map_err(classify)?;

        Ok(Arc::new(RedisConnection {
            conn,
            response_timeout: self.response_timeout,
        }))
    }

    fn describe(&self) -> String {
        format!("redis://{}", self.address)
    }
}

struct RedisConnection {
    conn: MultiplexedConnection,
    response_timeout: Duration,
}

impl RedisConnection {
    async fn query<T: FromRedisValue>(&self, name: &str, cmd: &Cmd) -> Result<T, BackendError> {
        let mut conn = self.conn.clone();
        within(self.response_timeout, name, cmd.query_async(&mut conn)).await
    }
}

#[async_trait]
impl Connection for RedisConnection {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.query("GET", ::redis::cmd("GET").arg(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(key).arg(value).arg("EX").arg(ttl.as_secs().max(1));
        self.query("SET", &cmd).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let _: i64 = self.query("DEL", ::redis::cmd("DEL").arg(key)).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let reply: String = self.query("PING", &::redis::cmd("PING")).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(BackendError::Command(format!("unexpected ping reply: {}", reply)))
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let mut cmd = ::redis::cmd("SCAN");
            cmd.arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH);
            let (next, batch): (u64, Vec<String>) = self.query("SCAN", &cmd).await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn quit(&self) -> Result<(), BackendError> {
        let _: String = self.query("QUIT", &::redis::cmd("QUIT")).await?;
        Ok(())
    }
}

/// Await one command reply, treating a missed deadline as a lost link.
async fn within<T>(
    deadline: Duration,
    command: &str,
    reply: impl Future<Output = Result<T, RedisError>>,
) -> Result<T, BackendError> {
    match tokio::time::timeout(deadline, reply).await {
        Ok(result) => result.map_err(classify),
        Err(_) => Err(BackendError::Connection(format!(
            "no reply to {} within {}ms",
            command,
            deadline.as_millis()
        ))),
    }
}

fn classify(err: RedisError) -> BackendError {
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        BackendError::Connection(err.to_string())
    } else {
        BackendError::Command(err.to_string())
    }
}

/// Escape redis glob metacharacters so `prefix` matches literally.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_metacharacters_are_escaped() {
        assert_eq!(escape_glob("journal:u1:entry:"), "journal:u1:entry:");
        assert_eq!(escape_glob("journal:a*b?[c]\\:"), "journal:a\\*b\\?\\[c\\]\\\\:");
    }

    #[test]
    fn connector_describes_address() {
        let connector = RedisConnector::new(&RedisSettings {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            connect_timeout: Duration::from_secs(1),
            response_timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(connector.describe(), "redis://localhost:6379");
    }

    #[tokio::test(start_paused = true)]
    async fn missed_reply_deadline_is_a_connection_error() {
        let hung = std::future::pending::<Result<String, RedisError>>();
        let err = within(Duration::from_millis(250), "GET", hung)
            .await
            .unwrap_err();
        assert!(err.is_connection());
        assert!(err.to_string().contains("no reply to GET within 250ms"), "{}", err);
    }

    #[tokio::test]
    async fn reply_errors_are_classified() {
        let refused = async {
            Err::<(), _>(RedisError::from((::redis::ErrorKind::ResponseError, "WRONGTYPE")))
        };
        let err = within(Duration::from_secs(1), "SET", refused).await.unwrap_err();
        assert!(!err.is_connection());

        let ok = async { Ok::<_, RedisError>(7_i64) };
        assert_eq!(within(Duration::from_secs(1), "DEL", ok).await.unwrap(), 7);
    }
}
