use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 服务器 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub i64);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 服务器在线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    #[default]
    Offline,
}

/// 告警接收人
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserRef {
    pub username: String,
    pub email: String,
}

impl UserRef {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.username, self.email)
    }
}

/// 已登记的服务器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    pub ip_address: String,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default)]
    pub recipients: BTreeSet<UserRef>,
}

impl Server {
    pub fn new(id: i64, name: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            id: ServerId(id),
            name: name.into(),
            ip_address: ip_address.into(),
            status: ServerStatus::Offline,
            recipients: BTreeSet::new(),
        }
    }

    pub fn with_recipient(mut self, user: UserRef) -> Self {
        self.recipients.insert(user);
        self
    }

    pub fn is_online(&self) -> bool {
        self.status == ServerStatus::Online
    }
}
