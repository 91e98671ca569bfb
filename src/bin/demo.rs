//! MarketChat demo
//!
//! Runs two users through the full loop against the in-memory store:
//! seed a conversation, aggregate it, open the thread, send a reply, and
//! watch the echo arrive through the live merge path.
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin marketchat-demo
//! ```

use std::sync::Arc;
use std::time::Duration;

use marketchat::engine::MessagingSession;
use marketchat::shared::messaging::NewMessage;
use marketchat::shared::AppConfig;
use marketchat::store::{Directory, MemoryDirectory, MemoryStore, MessageStore};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Give spawned fetch/send tasks a moment to finish, then drain results.
async fn settle<S, D>(session: &mut MessagingSession<S, D>)
where
    S: MessageStore + ?Sized + 'static,
    D: Directory + ?Sized + 'static,
{
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.poll();
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(MemoryDirectory::new());

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let lamp = Uuid::new_v4();
    directory.insert_user(alice, "Alice Archer").await;
    directory.insert_user(bob, "Bob Brooks").await;
    directory.insert_product(lamp, "Vintage Desk Lamp").await;

    // Bob opened the conversation before Alice signed in.
    store
        .insert_message(NewMessage {
            sender_id: bob,
            receiver_id: alice,
            product_id: lamp,
            content: "Hi! Is the lamp still available?".to_string(),
        })
        .await
        .expect("seed insert");

    let mut session = MessagingSession::new(
        Arc::clone(&store),
        Arc::clone(&directory),
        alice,
        AppConfig::default(),
    );
    settle(&mut session).await;

    println!("Your Conversations");
    println!("==================");
    for conversation in session.conversations() {
        println!(
            "{} - {}: {}",
            conversation.other_user_name, conversation.product_name, conversation.last_message
        );
    }

    let key = session.conversations()[0].key.clone();
    session.select(key);
    settle(&mut session).await;

    session.set_input("Yes, it is! Want to pick it up tomorrow?");
    session.send().expect("send");
    settle(&mut session).await;

    let thread = session.thread().expect("open thread");
    println!();
    println!("Thread");
    println!("======");
    for message in &thread.messages {
        let who = if message.sender_id == alice { "me" } else { "them" };
        println!("[{}] {}", who, message.content);
    }

    session.close();
}
