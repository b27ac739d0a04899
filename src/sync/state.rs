use serde::{Serialize, Serializer};

use crate::notifications::{Identity, Notification};

/// Which command owns the modal. Only used to word failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Analysis,
    Summary,
}

impl CommandKind {
    pub fn failure_message(&self, reason: &str) -> String {
        let what = match self {
            CommandKind::Analysis => "AI analysis",
            CommandKind::Summary => "AI summary",
        };
        format!("Sorry, the {} failed. The error was: {}", what, reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModalState {
    pub open: bool,
    pub title: String,
    pub content: String,
    pub loading: bool,
    #[serde(skip)]
    pub kind: Option<CommandKind>,
    /// Sequence number of the command whose result the modal is waiting for.
    #[serde(skip)]
    pub seq: u64,
}

/// A notification as sent to dashboard clients: the flat document plus the
/// "open file" action of print petitions.
#[derive(Serialize)]
struct NotificationView<'a> {
    #[serde(flatten)]
    notification: &'a Notification,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    print_petition: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    print_file_url: Option<&'a str>,
}

impl<'a> From<&'a Notification> for NotificationView<'a> {
    fn from(notification: &'a Notification) -> Self {
        Self {
            notification,
            print_petition: notification.is_print_petition(),
            print_file_url: notification.print_file_url(),
        }
    }
}

fn serialize_with_actions<S>(notifications: &[Notification], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(notifications.iter().map(NotificationView::from))
}

/// Everything the dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub auth_ready: bool,
    pub identity: Option<Identity>,
    #[serde(serialize_with = "serialize_with_actions")]
    pub notifications: Vec<Notification>,
    pub loading: bool,
    pub error: Option<String>,
    pub modal: ModalState,
    /// Generation of the subscription whose snapshots are accepted.
    #[serde(skip)]
    pub generation: Option<u64>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            auth_ready: false,
            identity: None,
            notifications: Vec::new(),
            loading: true,
            error: None,
            modal: ModalState::default(),
            generation: None,
        }
    }
}

impl ViewState {
    pub fn find_notification(&self, id: &str) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }
}
