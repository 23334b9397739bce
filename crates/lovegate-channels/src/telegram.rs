//! Telegram entry point: `/start` answers with a greeting and a button that
//! opens the web app inside Telegram. Nothing else is handled.

use std::sync::Arc;

use anyhow::Context;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};
use teloxide::utils::command::BotCommands;
use url::Url;

pub const DEFAULT_WEB_APP_URL: &str = "https://ai-girlfriend-nu.vercel.app";
pub const DEFAULT_GREETING: &str =
    "Привет! Я твоя AI подруга. Давай пообщаемся — открой приложение, и мы начнём интересный разговор.";
pub const OPEN_APP_BUTTON: &str = "Открыть приложение";

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "открыть приложение")]
    Start,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartReply {
    pub text: String,
    pub keyboard: InlineKeyboardMarkup,
}

pub struct TelegramAdapter {
    web_app_url: Url,
    greeting: String,
}

impl TelegramAdapter {
    pub fn new(web_app_url: &str, greeting: impl Into<String>) -> anyhow::Result<Self> {
        let web_app_url = Url::parse(web_app_url).with_context(|| format!("invalid web app url: {web_app_url}"))?;
        if web_app_url.scheme() != "https" {
            anyhow::bail!("web app url must use https: {web_app_url}");
        }
        Ok(Self {
            web_app_url,
            greeting: greeting.into(),
        })
    }

    pub fn web_app_url(&self) -> &Url {
        &self.web_app_url
    }

    pub fn start_reply(&self) -> StartReply {
        let button = InlineKeyboardButton::web_app(
            OPEN_APP_BUTTON,
            WebAppInfo {
                url: self.web_app_url.clone(),
            },
        );
        StartReply {
            text: self.greeting.clone(),
            keyboard: InlineKeyboardMarkup::new([[button]]),
        }
    }
}

pub struct TelegramBot {
    token: String,
    adapter: Arc<TelegramAdapter>,
}

impl TelegramBot {
    pub fn new(token: String, adapter: TelegramAdapter) -> Self {
        Self {
            token,
            adapter: Arc::new(adapter),
        }
    }

    pub async fn run_impl(self) -> anyhow::Result<()> {
        let bot = Bot::new(&self.token);
        let adapter = self.adapter;
        tracing::info!(url = %adapter.web_app_url(), "telegram bot starting");

        let handler = Update::filter_message()
            .filter_command::<Command>()
            .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                let adapter = adapter.clone();
                async move {
                    match cmd {
                        Command::Start => {
                            let reply = adapter.start_reply();
                            let user = msg.from.as_ref().map(|u| u.id.0).unwrap_or(0);
                            tracing::info!(chat = msg.chat.id.0, user, "/start");
                            if let Err(err) = bot
                                .send_message(msg.chat.id, reply.text)
                                .reply_markup(reply.keyboard)
                                .await
                            {
                                tracing::error!("failed to send /start reply: {err}");
                            }
                        }
                    }
                    Ok::<(), teloxide::RequestError>(())
                }
            });

        Dispatcher::builder(bot, handler)
            .default_handler(|_upd| async {
                tracing::trace!("ignoring non-command update");
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

#[async_trait::async_trait]
impl crate::ChannelBot for TelegramBot {
    fn channel_type(&self) -> &str {
        "telegram"
    }

    async fn run(self: Box<Self>) -> anyhow::Result<()> {
        (*self).run_impl().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn start_reply_has_greeting_and_single_web_app_button() {
        let adapter = TelegramAdapter::new(DEFAULT_WEB_APP_URL, DEFAULT_GREETING).unwrap();
        let reply = adapter.start_reply();

        assert_eq!(reply.text, DEFAULT_GREETING);
        assert_eq!(reply.keyboard.inline_keyboard.len(), 1);
        assert_eq!(reply.keyboard.inline_keyboard[0].len(), 1);

        let button = &reply.keyboard.inline_keyboard[0][0];
        assert_eq!(button.text, "Открыть приложение");
        match &button.kind {
            InlineKeyboardButtonKind::WebApp(info) => {
                assert_eq!(info.url.as_str(), "https://ai-girlfriend-nu.vercel.app/");
            }
            other => panic!("expected web app button, got {other:?}"),
        }
    }

    #[test]
    fn configured_url_and_greeting_are_used() {
        let adapter = TelegramAdapter::new("https://lovegate.example/app", "Хэй!").unwrap();
        let reply = adapter.start_reply();
        assert_eq!(reply.text, "Хэй!");
        let InlineKeyboardButtonKind::WebApp(info) = &reply.keyboard.inline_keyboard[0][0].kind else {
            panic!("expected web app button");
        };
        assert_eq!(info.url.as_str(), "https://lovegate.example/app");
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(TelegramAdapter::new("not a url", DEFAULT_GREETING).is_err());
        assert!(TelegramAdapter::new("http://insecure.example", DEFAULT_GREETING).is_err());
    }

    #[test]
    fn parses_start_command() {
        assert_eq!(Command::parse("/start", "lovegate_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/start@lovegate_bot", "lovegate_bot").unwrap(), Command::Start);
        assert!(Command::parse("/help", "lovegate_bot").is_err());
        assert!(Command::parse("hello", "lovegate_bot").is_err());
    }
}
