//! A handler that authenticates connections through the identity store
//! carried by the gateway's services.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use summoner_gateway::{
    Connection, Envelope, ExpiringCache, GameEvent, Gateway, GatewayConfig, HandlerError, IdentityStore, MemoryCache,
    MessageHandler, ServiceError, Services, UserIdentity,
};
use tokio::io::DuplexStream;
use tokio_tungstenite::tungstenite::{protocol::Role, Message};
use tokio_tungstenite::WebSocketStream;

struct Directory(Vec<UserIdentity>);

#[async_trait]
impl IdentityStore for Directory {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserIdentity>, ServiceError> {
        Ok(self.0.iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, ServiceError> {
        Ok(self.0.iter().find(|user| user.email == email).cloned())
    }
}

/// Accepts `Authentication` with `{"email": ...}` and rejects every other
/// event until the connection is authenticated.
struct Login;

#[async_trait]
impl MessageHandler for Login {
    async fn handle(&self, connection: &Arc<Connection>, envelope: Envelope) -> Result<(), HandlerError> {
        if envelope.event != GameEvent::Authentication {
            if !connection.is_authenticated() {
                connection.send(GameEvent::Unauthorized, json!({"event": envelope.event})).await?;
            }
            return Ok(());
        }

        let email = envelope.payload["email"]
            .as_str()
            .ok_or_else(|| HandlerError::InvalidPayload("missing email".to_string()))?;

        match connection.services().identity()?.find_by_email(email).await? {
            Some(user) => {
                connection.set_authenticated(true);
                connection
                    .services()
                    .cache()?
                    .set(
                        &format!("session:{}", connection.id()),
                        json!(user.id),
                        Duration::from_secs(3600),
                    )
                    .await?;
                connection.send(GameEvent::Authentication, json!({"username": user.username})).await?;
            }
            None => {
                connection.send(GameEvent::Forbidden, json!({"email": email})).await?;
            }
        }
        Ok(())
    }
}

fn services(cache: Arc<MemoryCache>) -> Services {
    let directory = Directory(vec![UserIdentity {
        id: "u-17".to_string(),
        username: "ayla".to_string(),
        email: "ayla@example.com".to_string(),
    }]);
    Services::new().with_identity_store(Arc::new(directory)).with_cache(cache)
}

async fn connect(gateway: &Gateway) -> (Arc<Connection>, WebSocketStream<DuplexStream>) {
    let (server_io, client_io) = tokio::io::duplex(16 * 1024);
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    let connection = gateway.admit(server, "127.0.0.1:42000".parse().unwrap()).await.unwrap();
    (connection, client)
}

async fn request(client: &mut WebSocketStream<DuplexStream>, text: &str) -> Envelope {
    client.send(Message::Text(text.into())).await.unwrap();
    match client.next().await {
        Some(Ok(Message::Text(reply))) => Envelope::decode(reply.as_str()).unwrap(),
        other => panic!("expected reply, got {other:?}"),
    }
}

#[tokio::test]
async fn known_user_is_authenticated() {
    let cache = Arc::new(MemoryCache::new());
    let gateway = Gateway::start(GatewayConfig::default(), Arc::new(Login), services(cache.clone()));
    let (connection, mut client) = connect(&gateway).await;

    let rejected = request(&mut client, r#"{"event":1,"payload":{}}"#).await;
    assert_eq!(rejected.event, GameEvent::Unauthorized);
    assert_eq!(rejected.payload["event"], 1);

    let reply = request(&mut client, r#"{"event":0,"payload":{"email":"ayla@example.com"}}"#).await;
    assert_eq!(reply.event, GameEvent::Authentication);
    assert_eq!(reply.payload["username"], "ayla");
    assert!(connection.is_authenticated());

    let session = cache.get(&format!("session:{}", connection.id())).await.unwrap();
    assert_eq!(session, Some(json!("u-17")));
}

#[tokio::test]
async fn unknown_user_is_forbidden() {
    let gateway = Gateway::start(
        GatewayConfig::default(),
        Arc::new(Login),
        services(Arc::new(MemoryCache::new())),
    );
    let (connection, mut client) = connect(&gateway).await;

    let reply = request(&mut client, r#"{"event":0,"payload":{"email":"nobody@example.com"}}"#).await;
    assert_eq!(reply.event, GameEvent::Forbidden);
    assert!(reply.event.is_error());
    assert!(!connection.is_authenticated());
    assert!(gateway.contains(connection.id()).await);
}
