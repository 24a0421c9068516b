//! Messaging facade.
//!
//! [`Messenger`] owns one of each core component (connection, registry,
//! typing tracker, store, reconciler) and is the only type external
//! collaborators talk to. Everything runs synchronously inside the caller's
//! turn: operations mutate state, fire handlers, and queue actions.

use parley_core::{
    Connection, ConnectionAction, ConnectionError, ConnectionState, MessageStore, OnlineStatus,
    Page, Participant, Reconciled, Reconciler, SubscriptionRegistry, TypingTracker,
    env::Environment,
    ids::{self, CONVERSATION_PREFIX},
};
use parley_proto::{
    Frame, MessageId, RoomId, UserId,
    payloads::{
        Attachment, Conversation, ConversationKind, ConversationLeave, ConversationRead,
        ConversationUpdate, ConversationUpdates, Join, Leave, Message, MessageDelete, MessageEdit,
        MessageKind, ReactionRemove, ReactionUpdate, Role, TypingIndicator, UserStatus,
    },
};
use tracing::{debug, info, warn};

use crate::{ClientAction, ClientConfig, ClientError, EventHandlers};

/// Display name used in notifications when the wire omits one.
const UNKNOWN_USER: &str = "Unknown User";

/// Real-time messaging facade.
///
/// Generic over the [`Environment`] so the same code runs against the system
/// clock in production and a virtual clock in tests.
///
/// # Failure semantics
///
/// Transport problems never surface as errors: outbound frames are dropped
/// while the connection is not open (no outbound queue), and the connection
/// reconnects on its own, replaying subscriptions. Mutations on unknown
/// message ids return `None`. [`ClientError`] is reserved for local misuse
/// such as sending without an active room.
pub struct Messenger<E: Environment> {
    env: E,
    config: ClientConfig,
    identity: Participant,
    connection: Connection<E::Instant>,
    registry: SubscriptionRegistry,
    typing: TypingTracker<E::Instant>,
    store: MessageStore,
    reconciler: Reconciler,
    conversations: Vec<Conversation>,
    handlers: EventHandlers,
    actions: Vec<ClientAction>,
    destroyed: bool,
}

impl<E: Environment> Messenger<E> {
    /// Create a messenger acting as `identity`.
    ///
    /// Starts connecting immediately when `config.auto_connect` is set.
    pub fn new(env: E, config: ClientConfig, identity: Participant) -> Self {
        let mut messenger = Self {
            connection: Connection::new(config.connection.clone()),
            typing: TypingTracker::new(config.typing_timeout, config.remote_typing_expiry),
            reconciler: Reconciler::new(identity.user_id.clone()),
            registry: SubscriptionRegistry::new(),
            store: MessageStore::new(),
            conversations: Vec::new(),
            handlers: EventHandlers::default(),
            actions: Vec::new(),
            destroyed: false,
            env,
            config,
            identity,
        };
        if messenger.config.auto_connect {
            messenger.connect();
        }
        messenger
    }

    /// Register handlers, replacing only the ones set on `handlers`.
    pub fn set_event_handlers(&mut self, handlers: EventHandlers) {
        self.handlers.merge(handlers);
    }

    /// Drain queued actions for the driver.
    pub fn take_actions(&mut self) -> Vec<ClientAction> {
        std::mem::take(&mut self.actions)
    }

    // Connection

    /// Start connecting. No-op if already connecting, open, or destroyed.
    pub fn connect(&mut self) {
        if self.destroyed {
            return;
        }
        let actions = self.connection.connect(self.env.now());
        self.apply_connection(actions);
    }

    /// Driver: the socket opened.
    pub fn handle_opened(&mut self) {
        let actions = self.connection.opened(self.env.now());
        self.apply_connection(actions);
    }

    /// Driver: the socket attempt failed.
    pub fn handle_connect_failed(&mut self, reason: impl Into<String>) {
        let actions = self.connection.connect_failed(&self.env, reason);
        self.apply_connection(actions);
    }

    /// Driver: the socket closed without us asking.
    pub fn handle_closed(&mut self, reason: impl Into<String>) {
        let actions = self.connection.closed(&self.env, reason);
        self.apply_connection(actions);
    }

    /// Driver: periodic tick. Fires heartbeats, reconnects, and typing expiry.
    pub fn tick(&mut self) {
        if self.destroyed {
            return;
        }
        let actions = self.connection.tick(&self.env);
        self.apply_connection(actions);

        let expired = self.typing.tick(self.env.now());
        self.send_all(expired);
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Failed reconnect attempts in the current outage.
    pub fn retry_count(&self) -> u32 {
        self.connection.retry_count()
    }

    /// Most recent transport failure.
    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.connection.last_error()
    }

    // Subscriptions

    /// Make `room_id` the active room, leaving the previous one first.
    ///
    /// `participant` becomes this messenger's identity.
    pub fn join(&mut self, room_id: &str, participant: Participant) -> Result<(), ClientError> {
        self.ensure_live()?;

        if let Some(previous) = self.registry.active_room()
            && previous != room_id
        {
            self.typing.cancel_for_room(previous);
        }

        let frames = self.registry.join(room_id, participant.clone(), self.env.wall_clock_millis());
        self.set_identity(participant);
        self.send_all(frames);
        Ok(())
    }

    /// Leave the active room, if any.
    pub fn leave(&mut self) -> Result<(), ClientError> {
        self.ensure_live()?;

        if let Some(room) = self.registry.active_room() {
            self.typing.cancel_for_room(room);
        }
        let frames = self.registry.leave();
        self.send_all(frames);
        Ok(())
    }

    /// Subscribe to a conversation without changing the active room.
    pub fn subscribe(&mut self, room_id: &str) -> Result<(), ClientError> {
        self.ensure_live()?;
        let frames =
            self.registry.subscribe(room_id, self.identity.clone(), self.env.wall_clock_millis());
        self.send_all(frames);
        Ok(())
    }

    /// Unsubscribe from a conversation.
    pub fn unsubscribe(&mut self, room_id: &str) -> Result<(), ClientError> {
        self.ensure_live()?;
        self.typing.cancel_for_room(room_id);
        let frames = self.registry.unsubscribe(room_id);
        self.send_all(frames);
        Ok(())
    }

    /// Create a conversation, announce it, and subscribe to it.
    ///
    /// The local participant is always included.
    pub fn create_conversation(
        &mut self,
        kind: ConversationKind,
        participants: Vec<UserId>,
        name: Option<String>,
    ) -> Result<Conversation, ClientError> {
        self.ensure_live()?;

        let mut members = vec![self.identity.user_id.clone()];
        for user in participants {
            if !members.contains(&user) {
                members.push(user);
            }
        }

        let conversation = Conversation {
            id: ids::generate(&self.env, CONVERSATION_PREFIX),
            kind,
            name,
            participants: members,
            created_by: self.identity.user_id.clone(),
            created_at: self.env.wall_clock_millis(),
            muted: false,
            pinned: false,
            archived: false,
        };
        info!(conversation_id = %conversation.id, "creating conversation");

        self.conversations.push(conversation.clone());
        self.send(Frame::ConversationCreate(conversation.clone()));
        self.subscribe(&conversation.id)?;
        Ok(conversation)
    }

    /// Change conversation settings and announce them.
    ///
    /// Mute, pin and archive only shape this client's view; peers take the
    /// name alone.
    pub fn update_conversation(
        &mut self,
        conversation_id: &str,
        updates: ConversationUpdates,
    ) -> Result<Conversation, ClientError> {
        self.ensure_live()?;
        let conversation = self.conversation_mut(conversation_id)?;
        conversation.apply(&updates);
        let updated = conversation.clone();

        self.send(Frame::ConversationUpdate(ConversationUpdate {
            conversation_id: conversation_id.to_owned(),
            updates,
        }));
        Ok(updated)
    }

    /// Leave a conversation for good.
    ///
    /// Drops the local participant from its participant list, announces the
    /// departure, then unsubscribes. The conversation stays listed.
    pub fn leave_conversation(&mut self, conversation_id: &str) -> Result<Conversation, ClientError> {
        self.ensure_live()?;
        let user_id = self.identity.user_id.clone();
        let conversation = self.conversation_mut(conversation_id)?;
        conversation.participants.retain(|p| *p != user_id);
        let updated = conversation.clone();
        info!(%conversation_id, "leaving conversation");

        self.send(Frame::ConversationLeave(ConversationLeave {
            conversation_id: conversation_id.to_owned(),
            user_id: Some(user_id),
        }));
        self.unsubscribe(conversation_id)?;
        Ok(updated)
    }

    /// Active room id.
    pub fn active_room(&self) -> Option<&str> {
        self.registry.active_room()
    }

    /// True if subscribed to `room_id`.
    pub fn is_subscribed(&self, room_id: &str) -> bool {
        self.registry.is_subscribed(room_id)
    }

    /// Subscribed room ids, in subscription order.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.registry.memberships().iter().map(|m| m.room_id.as_str())
    }

    /// Rooms with cached messages.
    pub fn cached_rooms(&self) -> impl Iterator<Item = &str> {
        self.store.rooms()
    }

    /// Conversations created by or announced to this client.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Local participant.
    pub fn identity(&self) -> &Participant {
        &self.identity
    }

    // Sending

    /// Send a text message to the active room as `sender`.
    ///
    /// The id is generated locally and the message is cached undelivered
    /// before the frame is sent, so it can be rendered immediately.
    pub fn send_message(
        &mut self,
        content: impl Into<String>,
        sender: &Participant,
    ) -> Result<MessageId, ClientError> {
        self.ensure_live()?;
        let room_id = self.registry.active_room().ok_or(ClientError::NoActiveRoom)?.to_owned();
        Ok(self.post(room_id, sender.clone(), content.into(), MessageKind::Text, Vec::new(), None))
    }

    /// Send a text message to a subscribed room, optionally as a reply.
    pub fn send_to(
        &mut self,
        room_id: &str,
        content: impl Into<String>,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ClientError> {
        self.ensure_subscribed(room_id)?;
        let sender = self.identity.clone();
        let content = content.into();
        Ok(self.post(room_id.to_owned(), sender, content, MessageKind::Text, Vec::new(), reply_to))
    }

    /// Describe an uploaded file under a freshly generated attachment id.
    pub fn new_attachment(
        &self,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        url: impl Into<String>,
    ) -> Attachment {
        Attachment {
            id: ids::attachment_id(&self.env),
            name: name.into(),
            mime_type: mime_type.into(),
            size,
            url: url.into(),
            thumbnail_url: None,
        }
    }

    /// Send an already-uploaded file to a subscribed room.
    ///
    /// The message kind is `image` for `image/*` MIME types, `file` otherwise.
    pub fn send_file(
        &mut self,
        room_id: &str,
        attachment: Attachment,
        caption: impl Into<String>,
    ) -> Result<MessageId, ClientError> {
        self.ensure_subscribed(room_id)?;
        let sender = self.identity.clone();
        let kind = attachment.message_kind();
        Ok(self.post(room_id.to_owned(), sender, caption.into(), kind, vec![attachment], None))
    }

    /// Replace the content of one of our own messages.
    ///
    /// Returns the updated message, or `None` if the id is unknown, the
    /// message is someone else's, deleted, or unchanged.
    pub fn edit_message(&mut self, message_id: &str, content: impl Into<String>) -> Option<Message> {
        if !self.owns(message_id) {
            return None;
        }
        let edit = MessageEdit { message_id: message_id.to_owned(), content: content.into() };
        let updated = self.reconciler.apply_edit(&mut self.store, edit.clone())?;

        self.send(Frame::MessageEdit(edit));
        self.emit_update(&updated);
        Some(updated)
    }

    /// Soft-delete one of our own messages: content cleared, id and position
    /// kept.
    pub fn delete_message(&mut self, message_id: &str) -> Option<Message> {
        if !self.owns(message_id) {
            return None;
        }
        let delete = MessageDelete { message_id: message_id.to_owned() };
        let updated =
            self.reconciler.apply_delete(&mut self.store, &delete, self.env.wall_clock_millis())?;

        self.send(Frame::MessageDelete(delete));
        self.emit_update(&updated);
        Some(updated)
    }

    /// Set our reaction on a message, replacing any previous one.
    pub fn add_reaction(&mut self, message_id: &str, emoji: impl Into<String>) -> Option<Message> {
        if self.destroyed {
            return None;
        }
        let update = ReactionUpdate {
            message_id: message_id.to_owned(),
            emoji: emoji.into(),
            user_id: self.identity.user_id.clone(),
            user_name: self.identity.user_name.clone(),
        };
        let updated = self.reconciler.apply_reaction(
            &mut self.store,
            update.clone(),
            self.env.wall_clock_millis(),
        )?;

        self.send(Frame::Reaction(update));
        self.emit_update(&updated);
        Some(updated)
    }

    /// Remove our reaction from a message.
    pub fn remove_reaction(&mut self, message_id: &str) -> Option<Message> {
        if self.destroyed {
            return None;
        }
        let remove = ReactionRemove {
            message_id: message_id.to_owned(),
            user_id: self.identity.user_id.clone(),
        };
        let updated = self.reconciler.apply_reaction_remove(&mut self.store, &remove)?;

        self.send(Frame::ReactionRemove(remove));
        self.emit_update(&updated);
        Some(updated)
    }

    /// Mark a message read.
    ///
    /// The `read_receipt` is sent even for ids not in the cache; the cached
    /// copy, if any, is updated immediately without waiting for an echo.
    pub fn mark_as_read(&mut self, message_id: &str) {
        if self.destroyed {
            return;
        }
        let items =
            self.reconciler.mark_as_read(&mut self.store, message_id, self.env.wall_clock_millis());
        self.apply_reconciled(items);
    }

    /// Mark every message in a conversation read.
    pub fn mark_conversation_read(&mut self, room_id: &str) {
        if self.destroyed {
            return;
        }
        let read = ConversationRead {
            conversation_id: room_id.to_owned(),
            user_id: self.identity.user_id.clone(),
        };
        self.send(Frame::ConversationRead(read.clone()));
        let items = self.reconciler.on_conversation_read(&mut self.store, &read);
        self.apply_reconciled(items);
    }

    /// Signal typing in the active room.
    ///
    /// `true` (re)arms the auto-expiry timer; `false` cancels it.
    pub fn send_typing(&mut self, is_typing: bool) -> Result<(), ClientError> {
        self.ensure_live()?;
        let room_id = self.registry.active_room().ok_or(ClientError::NoActiveRoom)?.to_owned();
        self.send_typing_to(&room_id, is_typing)
    }

    /// Signal typing in a subscribed room.
    pub fn send_typing_to(&mut self, room_id: &str, is_typing: bool) -> Result<(), ClientError> {
        self.ensure_subscribed(room_id)?;
        let frame = self.typing.send(room_id, &self.identity, is_typing, self.env.now());
        self.send(frame);
        Ok(())
    }

    // Queries

    /// Full cached history of a room, oldest first.
    pub fn history(&self, room_id: &str) -> &[Message] {
        self.store.history(room_id)
    }

    /// Page of a room's history, oldest first.
    ///
    /// `None` returns the first `default_page_size` messages.
    pub fn messages(&self, room_id: &str, page: Option<Page>) -> &[Message] {
        let page = page.unwrap_or(Page::first(self.config.default_page_size));
        self.store.page(room_id, page)
    }

    /// Cached message by id.
    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.store.get(message_id)
    }

    /// Case-insensitive content search, optionally within one room.
    pub fn search(&self, query: &str, room_id: Option<&str>) -> Vec<&Message> {
        self.store.search(query, room_id)
    }

    /// Remote participants typing in a room.
    pub fn typists(&self, room_id: &str) -> Vec<&TypingIndicator> {
        self.typing.typists(room_id)
    }

    /// "X is typing..." summary for a room. Empty when nobody is.
    pub fn typing_text(&self, room_id: &str) -> String {
        self.typing.typing_text(room_id)
    }

    /// Last known online status of a participant.
    pub fn presence(&self, user_id: &str) -> Option<&OnlineStatus> {
        self.typing.presence(user_id)
    }

    // Teardown

    /// Leave every room, cancel timers, close the transport, and clear all
    /// cached state. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        info!("destroying messenger");

        self.typing.clear();
        let leaves = self.registry.clear();
        self.send_all(leaves);

        let actions = self.connection.close("client destroyed");
        self.apply_connection(actions);

        self.store.clear();
        self.conversations.clear();
        self.handlers = EventHandlers::default();
        self.destroyed = true;
    }

    /// True once [`Self::destroy`] has run.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // Inbound

    /// Driver: a text frame arrived.
    ///
    /// Unknown frame types are ignored; malformed frames are logged and
    /// dropped. Neither is an error for the caller.
    pub fn handle_text(&mut self, text: &str) {
        if self.destroyed {
            return;
        }
        self.connection.record_activity(self.env.now());

        match Frame::decode(text) {
            Ok(frame) => self.handle_frame(frame),
            Err(e) if e.is_forward_compatible() => debug!(error = %e, "ignoring frame"),
            Err(e) => warn!(error = %e, "dropping malformed frame"),
        }
    }

    /// Dispatch a decoded inbound frame.
    pub fn handle_frame(&mut self, frame: Frame) {
        if self.destroyed {
            return;
        }
        match frame {
            Frame::Message(message) => {
                if !self.registry.is_subscribed(&message.room_id) {
                    debug!(room_id = %message.room_id, "message for unsubscribed room dropped");
                    return;
                }
                let items = self.reconciler.on_message(&mut self.store, *message);
                self.apply_reconciled(items);
            },
            Frame::Typing(indicator) => self.handle_typing(&indicator),
            Frame::ReadReceipt(receipt) => {
                let items = self.reconciler.on_read_receipt(&mut self.store, receipt);
                self.apply_reconciled(items);
            },
            Frame::Delivered(delivered) => {
                let items = self.reconciler.on_delivered(&mut self.store, delivered);
                self.apply_reconciled(items);
            },
            Frame::MessageEdit(edit) => {
                if let Some(updated) = self.reconciler.apply_edit(&mut self.store, edit) {
                    self.emit_update(&updated);
                }
            },
            Frame::MessageDelete(delete) => {
                let now_ms = self.env.wall_clock_millis();
                if let Some(updated) = self.reconciler.apply_delete(&mut self.store, &delete, now_ms) {
                    self.emit_update(&updated);
                }
            },
            Frame::Reaction(update) => {
                let now_ms = self.env.wall_clock_millis();
                if let Some(updated) = self.reconciler.apply_reaction(&mut self.store, update, now_ms)
                {
                    self.emit_update(&updated);
                }
            },
            Frame::ReactionRemove(remove) => {
                if let Some(updated) = self.reconciler.apply_reaction_remove(&mut self.store, &remove)
                {
                    self.emit_update(&updated);
                }
            },
            Frame::ConversationCreate(conversation) => self.handle_conversation(conversation),
            Frame::ConversationUpdate(update) => self.handle_conversation_update(update),
            Frame::ConversationLeave(leave) => self.handle_conversation_leave(leave),
            Frame::ConversationRead(read) => {
                if read.user_id != self.identity.user_id {
                    let items = self.reconciler.on_conversation_read(&mut self.store, &read);
                    self.apply_reconciled(items);
                }
            },
            Frame::UserOnline(status) => self.handle_presence(status, true),
            Frame::UserOffline(status) => self.handle_presence(status, false),
            Frame::Join(join) => self.handle_join(join),
            Frame::Leave(leave) => self.handle_leave(leave),
            Frame::Ping => self.send(Frame::Pong),
            Frame::Pong => {},
        }
    }

    fn handle_typing(&mut self, indicator: &TypingIndicator) {
        if indicator.user_id == self.identity.user_id {
            return;
        }
        if !self.registry.is_subscribed(&indicator.room_id) {
            debug!(room_id = %indicator.room_id, "typing for unsubscribed room dropped");
            return;
        }
        self.typing.apply_remote(indicator, self.env.now());
        if let Some(handler) = self.handlers.on_typing.as_mut() {
            handler(indicator);
        }
    }

    fn handle_presence(&mut self, status: UserStatus, online: bool) {
        let status = OnlineStatus { user_id: status.user_id, online, last_seen: status.last_seen };
        self.typing.set_presence(status.clone());
        if let Some(handler) = self.handlers.on_presence.as_mut() {
            handler(&status);
        }
    }

    fn handle_conversation(&mut self, conversation: Conversation) {
        let known = self.conversations.iter().any(|c| c.id == conversation.id);
        if known || !conversation.participants.contains(&self.identity.user_id) {
            return;
        }
        let room_id = conversation.id.clone();
        self.conversations.push(conversation);
        let frames =
            self.registry.subscribe(&room_id, self.identity.clone(), self.env.wall_clock_millis());
        self.send_all(frames);
    }

    fn handle_conversation_update(&mut self, update: ConversationUpdate) {
        let Some(name) = update.updates.name else {
            return;
        };
        let shared = ConversationUpdates { name: Some(name), ..ConversationUpdates::default() };
        if let Ok(conversation) = self.conversation_mut(&update.conversation_id)
            && conversation.apply(&shared)
        {
            debug!(conversation_id = %update.conversation_id, "conversation renamed");
        }
    }

    fn handle_conversation_leave(&mut self, leave: ConversationLeave) {
        let Some(user_id) = leave.user_id else {
            return;
        };
        if user_id == self.identity.user_id {
            return;
        }
        if let Ok(conversation) = self.conversation_mut(&leave.conversation_id) {
            conversation.participants.retain(|p| *p != user_id);
        }
    }

    fn handle_join(&mut self, join: Join) {
        if join.user_id == self.identity.user_id || !self.registry.is_subscribed(&join.room_id) {
            return;
        }
        let name = if join.user_name.is_empty() { UNKNOWN_USER.to_owned() } else { join.user_name };
        let content = format!("{name} has joined the chat");
        self.notify(join.room_id, join.user_id, name, join.user_role, content);
    }

    fn handle_leave(&mut self, leave: Leave) {
        if leave.user_id == self.identity.user_id || !self.registry.is_subscribed(&leave.room_id) {
            return;
        }
        let content = format!("{UNKNOWN_USER} has left the chat");
        self.notify(leave.room_id, leave.user_id, UNKNOWN_USER.to_owned(), Role::default(), content);
    }

    /// Synthesize a membership notification. Not cached.
    fn notify(&mut self, room_id: RoomId, user_id: UserId, name: String, role: Role, content: String) {
        let notification = Message {
            id: ids::message_id(&self.env),
            room_id,
            sender_id: user_id,
            sender_name: name,
            sender_role: role,
            content,
            kind: MessageKind::System,
            attachments: Vec::new(),
            reply_to: None,
            timestamp: self.env.wall_clock_millis(),
            read: false,
            delivered: true,
            read_by: Vec::new(),
            edited: false,
            deleted_at: None,
            reactions: Vec::new(),
        };
        if let Some(handler) = self.handlers.on_message.as_mut() {
            handler(&notification);
        }
    }

    // Internals

    fn post(
        &mut self,
        room_id: RoomId,
        sender: Participant,
        content: String,
        kind: MessageKind,
        attachments: Vec<Attachment>,
        reply_to: Option<MessageId>,
    ) -> MessageId {
        let message = Message {
            id: ids::message_id(&self.env),
            room_id,
            sender_id: sender.user_id,
            sender_name: sender.user_name,
            sender_role: sender.role,
            content,
            kind,
            attachments,
            reply_to,
            timestamp: self.env.wall_clock_millis(),
            read: false,
            delivered: false,
            read_by: Vec::new(),
            edited: false,
            deleted_at: None,
            reactions: Vec::new(),
        };
        let id = message.id.clone();
        debug!(message_id = %id, room_id = %message.room_id, "sending message");

        self.store.append(message.clone());
        self.send(Frame::message(message));
        id
    }

    fn set_identity(&mut self, participant: Participant) {
        self.reconciler.set_local_user(participant.user_id.clone());
        self.identity = participant;
    }

    fn owns(&self, message_id: &str) -> bool {
        !self.destroyed
            && self.store.get(message_id).is_some_and(|m| m.sender_id == self.identity.user_id)
    }

    fn conversation_mut(&mut self, conversation_id: &str) -> Result<&mut Conversation, ClientError> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| ClientError::UnknownConversation(conversation_id.to_owned()))
    }

    fn ensure_live(&self) -> Result<(), ClientError> {
        if self.destroyed { Err(ClientError::Destroyed) } else { Ok(()) }
    }

    fn ensure_subscribed(&self, room_id: &str) -> Result<(), ClientError> {
        self.ensure_live()?;
        if self.registry.is_subscribed(room_id) {
            Ok(())
        } else {
            Err(ClientError::NotSubscribed(room_id.to_owned()))
        }
    }

    /// Queue a frame if the connection is open; drop it otherwise.
    fn send(&mut self, frame: Frame) {
        if !self.connection.is_open() {
            debug!(
                frame_type = %frame.frame_type(),
                state = %self.connection.state(),
                "not connected, dropping frame"
            );
            return;
        }
        self.actions.push(ClientAction::Send(frame));
    }

    fn send_all(&mut self, frames: Vec<Frame>) {
        for frame in frames {
            self.send(frame);
        }
    }

    fn apply_connection(&mut self, actions: Vec<ConnectionAction>) {
        for action in actions {
            match action {
                ConnectionAction::Open => self.actions.push(ClientAction::Connect),
                ConnectionAction::SendFrame(frame) => self.send(frame),
                ConnectionAction::Close { reason } => {
                    self.actions.push(ClientAction::Disconnect { reason });
                },
                ConnectionAction::Resubscribe => {
                    let frames = self.registry.replay();
                    self.send_all(frames);
                },
                ConnectionAction::StateChanged(state) => {
                    if let Some(handler) = self.handlers.on_connection_state.as_mut() {
                        handler(state);
                    }
                },
            }
        }
    }

    fn apply_reconciled(&mut self, items: Vec<Reconciled>) {
        for item in items {
            match item {
                Reconciled::Send(frame) => self.send(frame),
                Reconciled::NewMessage(message) => {
                    if let Some(handler) = self.handlers.on_message.as_mut() {
                        handler(&message);
                    }
                },
                Reconciled::Updated(message) => self.emit_update(&message),
                Reconciled::Delivered(message_id) => {
                    if let Some(handler) = self.handlers.on_delivered.as_mut() {
                        handler(&message_id);
                    }
                },
                Reconciled::ReadReceipt(receipt) => {
                    if let Some(handler) = self.handlers.on_read_receipt.as_mut() {
                        handler(&receipt);
                    }
                },
            }
        }
    }

    fn emit_update(&mut self, message: &Message) {
        if let Some(handler) = self.handlers.on_message_update.as_mut() {
            handler(message);
        }
    }
}

impl<E: Environment> std::fmt::Debug for Messenger<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("identity", &self.identity)
            .field("state", &self.connection.state())
            .field("active_room", &self.registry.active_room())
            .field("cached", &self.store.len())
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}
