/// Easy VM Fleet - 远程执行层
///
/// SSH 会话、连接池与命令执行器

pub mod executor;
pub mod pool;
pub mod result;
pub mod session;

pub use executor::{CommandExecutor, CommandRunner, RunOptions, DRY_RUN_SENTINEL};
pub use pool::{ConnectionPool, PoolSettings};
pub use result::RemoteCommandResult;
pub use session::{Connector, Credential, RawOutput, RemoteSession, SshConnector, SshSession};
