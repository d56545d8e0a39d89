use uuid::Uuid;

pub type SessionId = Uuid;
