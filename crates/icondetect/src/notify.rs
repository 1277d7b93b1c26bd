//! Desktop notifications.

use icondetect_core::{NotifyConfig, Result};
use serde::Serialize;

/// Button on a notification that launches a protocol URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub label: String,
    pub uri: String,
}

/// One desktop notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub app_id: String,
    pub title: String,
    pub body: Option<String>,
    pub action: Option<NotificationAction>,
}

impl Notification {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            app_id: config.app_id.clone(),
            title: config.title.clone(),
            body: None,
            action: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a "Restart" button launching `uri`.
    pub fn with_restart(mut self, uri: impl Into<String>) -> Self {
        self.action = Some(NotificationAction {
            label: "Restart".to_string(),
            uri: uri.into(),
        });
        self
    }

    /// Toast XML payload.
    pub fn to_toast_xml(&self) -> String {
        let mut xml = String::from("<toast><visual><binding template=\"ToastGeneric\">");
        xml.push_str(&format!("<text>{}</text>", escape_xml(&self.title)));
        if let Some(body) = &self.body {
            xml.push_str(&format!("<text>{}</text>", escape_xml(body)));
        }
        xml.push_str("</binding></visual>");
        if let Some(action) = &self.action {
            xml.push_str(&format!(
                "<actions><action activationType=\"protocol\" content=\"{}\" arguments=\"{}\"/></actions>",
                escape_xml(&action.label),
                escape_xml(&action.uri)
            ));
        }
        xml.push_str("</toast>");
        xml
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Delivers notifications to the user.
pub trait Notifier {
    fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        match &notification.action {
            Some(action) => log::info!(
                "{}: {} [{}: {}]",
                notification.app_id,
                notification.title,
                action.label,
                action.uri
            ),
            None => log::info!("{}: {}", notification.app_id, notification.title),
        }
        Ok(())
    }
}

#[cfg(windows)]
pub use toast::ToastNotifier;

#[cfg(windows)]
mod toast {
    use super::{Notification, Notifier};
    use icondetect_core::{Error, Result};
    use windows::Data::Xml::Dom::XmlDocument;
    use windows::UI::Notifications::{ToastNotification, ToastNotificationManager};
    use windows::core::HSTRING;

    /// Windows toast notifications through the WinRT notification manager
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ToastNotifier;

    impl Notifier for ToastNotifier {
        fn notify(&self, notification: &Notification) -> Result<()> {
            let show = || -> windows::core::Result<()> {
                let doc = XmlDocument::new()?;
                doc.LoadXml(&HSTRING::from(notification.to_toast_xml()))?;
                let toast = ToastNotification::CreateToastNotification(&doc)?;
                ToastNotificationManager::CreateToastNotifierWithId(&HSTRING::from(
                    notification.app_id.as_str(),
                ))?
                .Show(&toast)
            };
            show().map_err(|e| Error::notify(e.to_string()))
        }
    }
}

/// Notifier for the current platform.
pub fn system_notifier() -> Box<dyn Notifier> {
    #[cfg(windows)]
    {
        Box::new(ToastNotifier)
    }
    #[cfg(not(windows))]
    {
        Box::new(LogNotifier)
    }
}
