use std::sync::{ Arc, Mutex };
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{ broadcast, watch };
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::db::{ keys, ChatMessage, ChatPreview, RecordStore };
use crate::enums::Sender;
use crate::error::{ AppError, Result };

const EVENT_BUFFER: usize = 256;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Change notification published after every successful chat write.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    MessageSent {
        thread_id: String,
        message: ChatMessage,
    },
    ThreadRead {
        thread_id: String,
        reader: Sender,
    },
}

impl ChatEvent {
    pub fn thread_id(&self) -> &str {
        match self {
            ChatEvent::MessageSent { thread_id, .. } => thread_id,
            ChatEvent::ThreadRead { thread_id, .. } => thread_id,
        }
    }
}

/// Preview row of the chat list, addressed by its thread id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    pub thread_id: String,
    #[serde(flatten)]
    pub preview: ChatPreview,
}

/// Everything a participant renders for one open thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThreadSnapshot {
    pub preview: Option<ChatPreview>,
    pub messages: Vec<ChatMessage>,
}

/// Support chat between each user (one thread per user id) and the admin team.
pub struct ChatChannel {
    store: RecordStore,
    events: broadcast::Sender<ChatEvent>,
    write_lock: Mutex<()>,
}

impl ChatChannel {
    pub fn new(store: RecordStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store,
            events,
            write_lock: Mutex::new(()),
        }
    }

    /// Append a message and refresh the thread preview, flagging it unread for the
    /// other side.
    pub fn send_message(
        &self,
        thread_id: &str,
        sender: Sender,
        user_name: Option<&str>,
        content: &str
    ) -> Result<ChatMessage> {
        if thread_id.trim().is_empty() {
            return Err(AppError::validation("threadId", "Thread id is required"));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::validation("content", "Message cannot be empty"));
        }

        let _guard = self.lock()?;

        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            sender,
            timestamp: Utc::now(),
            read: false,
        };

        let messages_key = keys::chat_messages(thread_id);
        let previous = self.list_thread_messages(thread_id);
        let mut messages = previous.clone();
        messages.push(message.clone());
        self.store.write_value(&messages_key, &messages)?;

        let existing: Option<ChatPreview> = self.store.get(keys::CHAT_INDEX, thread_id);
        let preview = ChatPreview {
            last_message: message.content.clone(),
            timestamp: message.timestamp,
            unread: sender == Sender::User || existing.as_ref().is_some_and(|p| p.unread),
            unread_for_user: sender == Sender::Admin ||
            existing.as_ref().is_some_and(|p| p.unread_for_user),
            user_name: user_name
                .map(str::to_string)
                .or_else(|| existing.map(|p| p.user_name))
                .unwrap_or_else(|| thread_id.to_string()),
        };

        if let Err(e) = self.store.save(keys::CHAT_INDEX, thread_id, &preview) {
            if let Err(rollback) = self.store.write_value(&messages_key, &previous) {
                tracing::error!("Could not roll back message {}: {}", message.id, rollback);
            }
            return Err(e);
        }

        tracing::debug!("{} posted to thread {}", sender, thread_id);
        self.publish(ChatEvent::MessageSent {
            thread_id: thread_id.to_string(),
            message: message.clone(),
        });
        Ok(message)
    }

    /// Previews of every thread, most recent first.
    pub fn list_thread_previews(&self) -> Vec<ThreadSummary> {
        let mut threads: Vec<ThreadSummary> = self.store
            .entries::<ChatPreview>(keys::CHAT_INDEX)
            .into_iter()
            .map(|(thread_id, preview)| ThreadSummary { thread_id, preview })
            .collect();
        threads.sort_by(|a, b| b.preview.timestamp.cmp(&a.preview.timestamp));
        threads
    }

    pub fn get_thread_preview(&self, thread_id: &str) -> Option<ChatPreview> {
        self.store.get(keys::CHAT_INDEX, thread_id)
    }

    /// Messages in append order.
    pub fn list_thread_messages(&self, thread_id: &str) -> Vec<ChatMessage> {
        self.store.read_value(&keys::chat_messages(thread_id)).unwrap_or_default()
    }

    /// Clear `reader`'s unread flag and mark the other side's messages as read.
    pub fn mark_thread_read(&self, thread_id: &str, reader: Sender) -> Result<()> {
        let _guard = self.lock()?;

        if let Some(mut preview) = self.store.get::<ChatPreview>(keys::CHAT_INDEX, thread_id) {
            if preview.is_unread_for(reader) {
                match reader {
                    Sender::Admin => {
                        preview.unread = false;
                    }
                    Sender::User => {
                        preview.unread_for_user = false;
                    }
                }
                self.store.save(keys::CHAT_INDEX, thread_id, &preview)?;
            }
        }

        let mut messages = self.list_thread_messages(thread_id);
        let mut changed = false;
        for message in messages.iter_mut().filter(|m| m.sender == reader.counterpart() && !m.read) {
            message.read = true;
            changed = true;
        }
        if changed {
            self.store.write_value(&keys::chat_messages(thread_id), &messages)?;
        }

        self.publish(ChatEvent::ThreadRead {
            thread_id: thread_id.to_string(),
            reader,
        });
        Ok(())
    }

    /// Admin console opening a conversation.
    pub fn open_thread(&self, thread_id: &str) -> Result<()> {
        self.mark_thread_read(thread_id, Sender::Admin)
    }

    /// Threads with something unread for `viewer`; drives the dashboard badge.
    pub fn unread_count(&self, viewer: Sender) -> usize {
        self.store
            .all::<ChatPreview>(keys::CHAT_INDEX)
            .iter()
            .filter(|preview| preview.is_unread_for(viewer))
            .count()
    }

    pub fn snapshot(&self, thread_id: &str) -> ThreadSnapshot {
        ThreadSnapshot {
            preview: self.get_thread_preview(thread_id),
            messages: self.list_thread_messages(thread_id),
        }
    }

    /// Push notifications for writes made through this channel.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Keep a snapshot of `thread_id` current. Push events refresh it immediately; the
    /// `interval` re-read picks up writes made by other processes sharing the store.
    pub fn watch_thread(self: &Arc<Self>, thread_id: &str, interval: Duration) -> ThreadWatch {
        let channel = Arc::clone(self);
        let thread_id = thread_id.to_string();
        let mut events = self.events.subscribe();
        let (publisher, snapshots) = watch::channel(self.snapshot(&thread_id));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut push_open = true;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    event = events.recv(), if push_open => {
                        match event {
                            Ok(event) if event.thread_id() != thread_id => continue,
                            Ok(_) => {}
                            Err(RecvError::Lagged(skipped)) => {
                                tracing::debug!("Chat watcher for {} skipped {} events", thread_id, skipped);
                            }
                            Err(RecvError::Closed) => {
                                push_open = false;
                            }
                        }
                    }
                }

                let snapshot = channel.snapshot(&thread_id);
                publisher.send_if_modified(|current| {
                    if *current == snapshot {
                        return false;
                    }
                    *current = snapshot;
                    true
                });

                if publisher.is_closed() {
                    break;
                }
            }
        });

        ThreadWatch { snapshots, task }
    }

    fn publish(&self, event: ChatEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| AppError::Internal("chat lock poisoned".to_string()))
    }
}

/// Handle on a running thread watcher. Stopping or dropping it ends the background task.
pub struct ThreadWatch {
    snapshots: watch::Receiver<ThreadSnapshot>,
    task: JoinHandle<()>,
}

impl ThreadWatch {
    pub fn current(&self) -> ThreadSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn receiver(&self) -> watch::Receiver<ThreadSnapshot> {
        self.snapshots.clone()
    }

    /// Wait for the next published snapshot.
    pub async fn changed(&mut self) -> Result<ThreadSnapshot> {
        self.snapshots
            .changed().await
            .map_err(|_| AppError::Unavailable("chat watcher stopped".to_string()))?;
        Ok(self.snapshots.borrow_and_update().clone())
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for ThreadWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn test_messages_keep_append_order() {
        let chat = ChatChannel::new(RecordStore::in_memory());
        for n in 0..5 {
            chat.send_message("alice-uid", Sender::User, Some("Alice"), &format!("m{}", n)).unwrap();
        }

        let contents: Vec<String> = chat
            .list_thread_messages("alice-uid")
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_admin_message_is_unread_for_user_until_opened() {
        let chat = ChatChannel::new(RecordStore::in_memory());

        chat.send_message("alice-uid", Sender::Admin, Some("Alice Martin"), "Hello").unwrap();

        let preview = chat.get_thread_preview("alice-uid").unwrap();
        assert_eq!(preview.last_message, "Hello");
        assert!(preview.is_unread_for(Sender::User));
        assert!(!preview.is_unread_for(Sender::Admin));

        chat.mark_thread_read("alice-uid", Sender::User).unwrap();

        let preview = chat.get_thread_preview("alice-uid").unwrap();
        assert!(!preview.is_unread_for(Sender::User));
        assert!(chat.list_thread_messages("alice-uid").iter().all(|m| m.read));
    }

    #[test]
    fn test_user_message_flags_admin_side() {
        let chat = ChatChannel::new(RecordStore::in_memory());
        chat.send_message("alice-uid", Sender::User, Some("Alice"), "Hi").unwrap();
        chat.send_message("bob-uid", Sender::User, Some("Bob"), "Hey").unwrap();
        assert_eq!(chat.unread_count(Sender::Admin), 2);

        chat.open_thread("alice-uid").unwrap();
        assert_eq!(chat.unread_count(Sender::Admin), 1);

        let threads: Vec<String> = chat
            .list_thread_previews()
            .into_iter()
            .map(|t| t.thread_id)
            .collect();
        assert_eq!(threads, vec!["bob-uid", "alice-uid"]);
    }

    #[test]
    fn test_preview_keeps_user_name() {
        let chat = ChatChannel::new(RecordStore::in_memory());
        chat.send_message("alice-uid", Sender::User, Some("Alice"), "Hi").unwrap();
        chat.send_message("alice-uid", Sender::Admin, None, "Hello").unwrap();

        assert_eq!(chat.get_thread_preview("alice-uid").unwrap().user_name, "Alice");
    }

    #[test]
    fn test_empty_message_rejected() {
        let chat = ChatChannel::new(RecordStore::in_memory());
        assert!(matches!(
            chat.send_message("alice-uid", Sender::User, None, "   "),
            Err(AppError::Validation { .. })
        ));
        assert!(chat.list_thread_previews().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let chat = ChatChannel::new(RecordStore::in_memory());
        let mut events = chat.subscribe();

        let sent = chat.send_message("alice-uid", Sender::User, None, "Hi").unwrap();

        match events.recv().await.unwrap() {
            ChatEvent::MessageSent { thread_id, message } => {
                assert_eq!(thread_id, "alice-uid");
                assert_eq!(message, sent);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_watch_refreshes_on_push() {
        let chat = Arc::new(ChatChannel::new(RecordStore::in_memory()));
        let mut watch = chat.watch_thread("alice-uid", Duration::from_secs(60));
        assert!(watch.current().messages.is_empty());

        chat.send_message("alice-uid", Sender::Admin, None, "Hello").unwrap();

        let snapshot = timeout(WAIT, watch.changed()).await.unwrap().unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.preview.unwrap().last_message, "Hello");
    }

    #[tokio::test]
    async fn test_watch_polls_writes_from_other_channels() {
        let store = RecordStore::in_memory();
        let viewer = Arc::new(ChatChannel::new(store.clone()));
        let other_tab = ChatChannel::new(store);

        let mut watch = viewer.watch_thread("alice-uid", Duration::from_millis(20));
        other_tab.send_message("alice-uid", Sender::User, None, "From elsewhere").unwrap();

        let snapshot = timeout(WAIT, watch.changed()).await.unwrap().unwrap();
        assert_eq!(snapshot.messages[0].content, "From elsewhere");
    }

    #[tokio::test]
    async fn test_dropping_watch_stops_task() {
        let chat = Arc::new(ChatChannel::new(RecordStore::in_memory()));
        let watch = chat.watch_thread("alice-uid", Duration::from_millis(20));
        let mut receiver = watch.receiver();

        drop(watch);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(receiver.changed().await.is_err());
    }
}
