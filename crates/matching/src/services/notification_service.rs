//! Match-completion notifications.
//!
//! Delivery happens after the finalization transaction has committed and is
//! isolated per recipient: a failing recipient is logged and counted, and
//! never touches the chatroom that was already created.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use groupting_database::{Chatroom, Group};

use crate::types::Finalized;

pub const MATCH_COMPLETED_KIND: &str = "matching_completed";

/// Payload sent to a participant of a newly created chatroom.
///
/// The event is written from the recipient's side: `group_id` is the group
/// the recipient came from and `matched_*` describe the other group. Member
/// counts are taken from the group snapshots read inside the finalization
/// transaction, since the groups no longer exist afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCompleted {
    pub group_id: String,
    pub matched_group_id: String,
    pub matched_group_name: Option<String>,
    pub chatroom_id: String,
    pub group_member_count: usize,
    pub matched_member_count: usize,
    pub participants: Vec<String>,
}

impl MatchCompleted {
    /// The event as seen by members of `own`.
    pub fn between(chatroom: &Chatroom, own: &Group, other: &Group) -> Self {
        Self {
            group_id: own.id.clone(),
            matched_group_id: other.id.clone(),
            matched_group_name: other.name.clone(),
            chatroom_id: chatroom.id.clone(),
            group_member_count: own.member_count(),
            matched_member_count: other.member_count(),
            participants: chatroom.participants.clone(),
        }
    }

    /// One event per participant, in chatroom order.
    ///
    /// A user who was in both groups is listed once and gets the
    /// finalizer's side.
    pub fn per_participant(finalized: &Finalized) -> Vec<(String, MatchCompleted)> {
        let Finalized {
            chatroom,
            group,
            peer,
        } = finalized;
        let own_side = Self::between(chatroom, group, peer);
        let peer_side = Self::between(chatroom, peer, group);

        chatroom
            .participants
            .iter()
            .map(|user_id| {
                let event = if group.has_member(user_id) {
                    own_side.clone()
                } else {
                    peer_side.clone()
                };
                (user_id.clone(), event)
            })
            .collect()
    }

    pub fn is_one_on_one(&self) -> bool {
        self.group_member_count == 1 && self.matched_member_count == 1
    }

    pub fn matching_type(&self) -> &'static str {
        if self.is_one_on_one() {
            "1v1"
        } else {
            "group"
        }
    }

    pub fn total_members(&self) -> usize {
        self.group_member_count + self.matched_member_count
    }

    pub fn title(&self) -> &'static str {
        "Match complete!"
    }

    pub fn body(&self) -> String {
        if self.is_one_on_one() {
            "You've been matched with a new friend! Start chatting now!".to_string()
        } else {
            format!(
                "{} vs {} group match! {} people are joining the chat!",
                self.group_member_count,
                self.matched_member_count,
                self.total_members()
            )
        }
    }
}

/// Delivery channel for match-completion events.
#[async_trait]
pub trait MatchNotifier: Send + Sync {
    async fn notify_member(&self, user_id: &str, event: &MatchCompleted) -> anyhow::Result<()>;
}

/// Notifier that only records deliveries in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl MatchNotifier for LoggingNotifier {
    async fn notify_member(&self, user_id: &str, event: &MatchCompleted) -> anyhow::Result<()> {
        info!(
            user_id = %user_id,
            kind = MATCH_COMPLETED_KIND,
            chatroom_id = %event.chatroom_id,
            matching_type = event.matching_type(),
            total_members = event.total_members(),
            title = event.title(),
            body = %event.body(),
            "match notification"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: Vec<String>,
}

impl DeliveryReport {
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// Send each participant the event for their own side, one at a time.
pub async fn dispatch_match_completed(
    notifier: &Arc<dyn MatchNotifier>,
    finalized: &Finalized,
) -> DeliveryReport {
    let chatroom_id = &finalized.chatroom.id;
    let mut report = DeliveryReport::default();

    for (user_id, event) in MatchCompleted::per_participant(finalized) {
        match notifier.notify_member(&user_id, &event).await {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                warn!(
                    user_id = %user_id,
                    chatroom_id = %chatroom_id,
                    error = %err,
                    "match notification failed"
                );
                report.failed.push(user_id);
            }
        }
    }

    info!(
        chatroom_id = %chatroom_id,
        delivered = report.delivered,
        failed = report.failure_count(),
        "match notifications sent"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupting_database::CreateGroupRequest;

    fn event(group: usize, matched: usize) -> MatchCompleted {
        MatchCompleted {
            group_id: "G1".to_string(),
            matched_group_id: "G2".to_string(),
            matched_group_name: Some("Second".to_string()),
            chatroom_id: "G1_G2".to_string(),
            group_member_count: group,
            matched_member_count: matched,
            participants: Vec::new(),
        }
    }

    #[test]
    fn test_one_on_one_wording() {
        let event = event(1, 1);
        assert_eq!(event.matching_type(), "1v1");
        assert_eq!(event.total_members(), 2);
        assert!(event.body().contains("new friend"));
    }

    #[test]
    fn test_group_wording() {
        let event = event(3, 3);
        assert_eq!(event.matching_type(), "group");
        assert_eq!(event.body(), "3 vs 3 group match! 6 people are joining the chat!");
    }

    fn group(id: &str, members: &[&str]) -> Group {
        Group::new(&CreateGroupRequest {
            id: Some(id.to_string()),
            name: Some(format!("group {id}")),
            member_ids: members.iter().map(|m| m.to_string()).collect(),
        })
    }

    #[test]
    fn test_each_side_sees_the_other_group() {
        let g1 = group("G1", &["a"]);
        let g2 = group("G2", &["b", "c", "d"]);
        let finalized = Finalized {
            chatroom: Chatroom::new(
                "G1_G2",
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
                vec!["G1".into(), "G2".into()],
            ),
            group: g1,
            peer: g2,
        };

        let events = MatchCompleted::per_participant(&finalized);
        let recipients: Vec<&str> = events.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(recipients, vec!["a", "b", "c", "d"]);

        let (_, for_a) = &events[0];
        assert_eq!(for_a.group_id, "G1");
        assert_eq!(for_a.matched_group_id, "G2");
        assert_eq!(for_a.matched_group_name.as_deref(), Some("group G2"));
        assert_eq!(for_a.body(), "1 vs 3 group match! 4 people are joining the chat!");

        for (_, for_peer) in &events[1..] {
            assert_eq!(for_peer.group_id, "G2");
            assert_eq!(for_peer.matched_group_id, "G1");
            assert_eq!(for_peer.matched_group_name.as_deref(), Some("group G1"));
            assert_eq!(for_peer.group_member_count, 3);
            assert_eq!(for_peer.matched_member_count, 1);
            assert_eq!(for_peer.body(), "3 vs 1 group match! 4 people are joining the chat!");
        }
    }

    #[test]
    fn test_shared_member_gets_the_finalizer_side() {
        let finalized = Finalized {
            chatroom: Chatroom::new(
                "G1_G2",
                vec!["a".into(), "b".into(), "c".into()],
                vec!["G1".into(), "G2".into()],
            ),
            group: group("G1", &["a", "b"]),
            peer: group("G2", &["b", "c"]),
        };

        let events = MatchCompleted::per_participant(&finalized);
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].0, "b");
        assert_eq!(events[1].1.group_id, "G1");
        assert_eq!(events[2].1.group_id, "G2");
    }

    #[test]
    fn test_payload_is_camel_case() {
        let json = serde_json::to_value(event(2, 2)).unwrap();
        assert_eq!(json["chatroomId"], "G1_G2");
        assert_eq!(json["matchedMemberCount"], 2);
    }
}
