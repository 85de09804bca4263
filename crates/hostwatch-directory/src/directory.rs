use crate::error::{DirectoryError, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hostwatch_types::{Server, ServerId, ServerStatus, UserRef};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// 服务器目录
///
/// 告警核心只读取服务器身份和接收人，唯一的写操作是在线状态切换。
#[async_trait]
pub trait ServerDirectory: Send + Sync {
    /// 按 IP 查找服务器，未登记返回 `None`（不是错误）
    async fn resolve(&self, ip: &str) -> Result<Option<Server>>;

    /// 按 ID 查找服务器
    async fn get(&self, server_id: ServerId) -> Result<Option<Server>>;

    /// 服务器关联的告警接收人
    async fn recipients_of(&self, server_id: ServerId) -> Result<BTreeSet<UserRef>>;

    /// 设置在线状态，返回原状态
    async fn set_status(&self, server_id: ServerId, status: ServerStatus) -> Result<ServerStatus>;

    async fn list(&self) -> Result<Vec<Server>>;
}

/// 以 IP 为索引的内存目录
#[derive(Default)]
pub struct InMemoryDirectory {
    servers: DashMap<ServerId, Server>,
    by_ip: DashMap<String, ServerId>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_servers(servers: impl IntoIterator<Item = Server>) -> Result<Self> {
        let directory = Self::new();
        for server in servers {
            directory.register(server)?;
        }
        Ok(directory)
    }

    /// 登记服务器，IP 和 ID 都必须唯一
    pub fn register(&self, server: Server) -> Result<()> {
        if self.servers.contains_key(&server.id) {
            return Err(DirectoryError::AlreadyExists(format!("id {}", server.id)));
        }

        match self.by_ip.entry(server.ip_address.clone()) {
            Entry::Occupied(_) => Err(DirectoryError::AlreadyExists(format!(
                "ip {}",
                server.ip_address
            ))),
            Entry::Vacant(slot) => {
                info!(
                    server_id = %server.id,
                    server_name = %server.name,
                    ip = %server.ip_address,
                    "Server registered"
                );
                slot.insert(server.id);
                self.servers.insert(server.id, server);
                Ok(())
            }
        }
    }

    pub fn unregister(&self, server_id: ServerId) -> Result<Server> {
        let (_, server) = self
            .servers
            .remove(&server_id)
            .ok_or(DirectoryError::NotFound(server_id))?;
        self.by_ip.remove(&server.ip_address);
        info!(server_id = %server_id, "Server unregistered");
        Ok(server)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[async_trait]
impl ServerDirectory for InMemoryDirectory {
    async fn resolve(&self, ip: &str) -> Result<Option<Server>> {
        let Some(id) = self.by_ip.get(ip).map(|r| *r.value()) else {
            debug!(ip = %ip, "No server registered for ip");
            return Ok(None);
        };
        Ok(self.servers.get(&id).map(|r| r.value().clone()))
    }

    async fn get(&self, server_id: ServerId) -> Result<Option<Server>> {
        Ok(self.servers.get(&server_id).map(|r| r.value().clone()))
    }

    async fn recipients_of(&self, server_id: ServerId) -> Result<BTreeSet<UserRef>> {
        self.servers
            .get(&server_id)
            .map(|r| r.recipients.clone())
            .ok_or(DirectoryError::NotFound(server_id))
    }

    async fn set_status(&self, server_id: ServerId, status: ServerStatus) -> Result<ServerStatus> {
        let mut server = self
            .servers
            .get_mut(&server_id)
            .ok_or(DirectoryError::NotFound(server_id))?;
        let previous = server.status;
        server.status = status;
        Ok(previous)
    }

    async fn list(&self) -> Result<Vec<Server>> {
        let mut servers: Vec<Server> = self.servers.iter().map(|r| r.value().clone()).collect();
        servers.sort_by_key(|s| s.id);
        Ok(servers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_server() -> Server {
        Server::new(1, "web-1", "10.0.0.1").with_recipient(UserRef::new("ops", "ops@example.com"))
    }

    #[tokio::test]
    async fn test_resolve_by_ip() {
        let directory = InMemoryDirectory::from_servers([web_server()]).unwrap();

        let server = directory.resolve("10.0.0.1").await.unwrap().unwrap();
        assert_eq!(server.name, "web-1");
        assert!(directory.resolve("10.0.0.5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let directory = InMemoryDirectory::from_servers([web_server()]).unwrap();

        let server = directory.get(ServerId(1)).await.unwrap().unwrap();
        assert_eq!(server.ip_address, "10.0.0.1");
        assert!(directory.get(ServerId(7)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_ip() {
        let directory = InMemoryDirectory::new();
        directory.register(web_server()).unwrap();

        let result = directory.register(Server::new(2, "web-2", "10.0.0.1"));
        assert!(matches!(result, Err(DirectoryError::AlreadyExists(_))));

        let result = directory.register(Server::new(1, "web-3", "10.0.0.3"));
        assert!(matches!(result, Err(DirectoryError::AlreadyExists(_))));
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn test_recipients_and_status() {
        let directory = InMemoryDirectory::from_servers([web_server()]).unwrap();

        let recipients = directory.recipients_of(ServerId(1)).await.unwrap();
        assert_eq!(recipients.len(), 1);

        let previous = directory.set_status(ServerId(1), ServerStatus::Online).await.unwrap();
        assert_eq!(previous, ServerStatus::Offline);
        assert!(directory.resolve("10.0.0.1").await.unwrap().unwrap().is_online());

        let missing = directory.set_status(ServerId(9), ServerStatus::Online).await;
        assert!(matches!(missing, Err(DirectoryError::NotFound(ServerId(9)))));
    }

    #[tokio::test]
    async fn test_list_sorted_by_id() {
        let directory = InMemoryDirectory::from_servers([
            Server::new(3, "db-1", "10.0.0.3"),
            web_server(),
        ])
        .unwrap();

        let ids: Vec<ServerId> = directory.list().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![ServerId(1), ServerId(3)]);
    }

    #[tokio::test]
    async fn test_unregister_frees_ip() {
        let directory = InMemoryDirectory::from_servers([web_server()]).unwrap();
        directory.unregister(ServerId(1)).unwrap();

        assert!(directory.resolve("10.0.0.1").await.unwrap().is_none());
        directory.register(Server::new(2, "web-2", "10.0.0.1")).unwrap();
        assert!(directory.resolve("10.0.0.1").await.unwrap().is_some());
    }
}
