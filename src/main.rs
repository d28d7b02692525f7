use std::sync::Arc;
use std::time::Duration;

use iced::{
    alignment,
    event::{self, Event as IcedEvent},
    keyboard::{self, Key},
    time, window,
    widget::{button, column, container, pick_list, row, scrollable, text, text_editor, text_input, Column},
    clipboard, Element, Length, Padding, Subscription, Task, Theme,
};
use tracing_subscriber::EnvFilter;

use agent4agents::config::Config;
use agent4agents::contact::{ContactBook, ContactRequest};
use agent4agents::diagnostics;
use agent4agents::export;
use agent4agents::flow::{self, answer_slots, AgentReply, Answer, Flow, Phase};
use agent4agents::model::{find_choice, Choice, HistoryEntry, INTERACTION_CHANNELS, MODEL_ECOSYSTEMS};
use agent4agents::parser::SlotMap;
use agent4agents::storage::{KeyValueStore, MemoryStore, SqliteStore};
use agent4agents::{AgentClient, ContactError, FieldError, FlowError, HistoryStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("AGENT4AGENTS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> iced::Result {
    init_tracing();
    let config = Config::load();

    iced::application("Agent4Agents", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size: iced::Size::new(config.window.width as f32, config.window.height as f32),
            min_size: Some(iced::Size::new(
                config.window.min_width as f32,
                config.window.min_height as f32,
            )),
            position: window::Position::Centered,
            ..Default::default()
        })
        .run_with(App::new)
}

#[derive(Debug, Clone)]
enum Message {
    DescriptionEdited(text_editor::Action),
    TargetsEdited(text_editor::Action),
    EcosystemSelected(Choice),
    ChannelSelected(Choice),
    Submit,
    Finished(String, Result<AgentReply, FlowError>),
    NewAnalysis,
    ToggleHistory,
    SelectEntry(String),
    RemoveEntry(String),
    ClearHistory,
    ToggleJudge,
    CopyEntry,
    ExportEntry,
    OpenContact,
    CloseContact,
    ContactName(String),
    ContactEmail(String),
    ContactMessage(String),
    SendContact,
    Tick,
    Escape,
}

#[derive(Default)]
struct ContactForm {
    name: String,
    email: String,
    message: String,
    errors: Vec<FieldError>,
    failure: Option<String>,
    sent: Option<String>,
}

impl ContactForm {
    fn error_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

struct App {
    config: Config,
    flow: Flow,
    history: HistoryStore,
    client: Arc<AgentClient>,
    slots: SlotMap<Answer>,
    contacts: ContactBook,
    description: text_editor::Content,
    targets: text_editor::Content,
    show_history: bool,
    show_judge: bool,
    contact: Option<ContactForm>,
    notice: Option<String>,
    loading_frame: usize,
}

impl App {
    fn new() -> (Self, Task<Message>) {
        let config = Config::load();

        let medium: Box<dyn KeyValueStore> = match SqliteStore::open(&config.storage.history_db()) {
            Ok(store) => Box::new(store),
            Err(e) => {
                tracing::warn!("history database unavailable, keeping history in memory: {:#}", e);
                diagnostics::log_with(
                    diagnostics::Kind::Persistence,
                    "Verlauf wird nur im Speicher gehalten",
                );
                Box::new(MemoryStore::new())
            }
        };

        let app = App {
            flow: Flow::new(),
            history: HistoryStore::open(medium),
            client: Arc::new(AgentClient::with_config(&config.agent)),
            slots: answer_slots(&config.agent),
            contacts: ContactBook::new(config.storage.contacts_file()),
            description: text_editor::Content::new(),
            targets: text_editor::Content::new(),
            show_history: false,
            show_judge: false,
            contact: None,
            notice: None,
            loading_frame: 0,
            config,
        };
        tracing::info!("agent runtime at {}", app.client.base_url());

        (app, Task::none())
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::DescriptionEdited(action) => {
                if !self.flow.is_loading() {
                    self.description.perform(action);
                    self.flow.form_mut().use_case_description = self.description.text();
                }
                Task::none()
            }
            Message::TargetsEdited(action) => {
                if !self.flow.is_loading() {
                    self.targets.perform(action);
                    self.flow.form_mut().integration_targets = self.targets.text();
                }
                Task::none()
            }
            Message::EcosystemSelected(choice) => {
                if !self.flow.is_loading() {
                    self.flow.form_mut().preferred_model_ecosystem = choice.value.to_string();
                }
                Task::none()
            }
            Message::ChannelSelected(choice) => {
                if !self.flow.is_loading() {
                    self.flow.form_mut().interaction_channel = choice.value.to_string();
                }
                Task::none()
            }
            Message::Submit => {
                let input = self.flow.form().clone();
                let submission = match self.flow.begin(input) {
                    Ok(submission) => submission,
                    Err(_) => return Task::none(),
                };

                self.loading_frame = 0;
                self.notice = None;
                self.contact = None;
                let client = self.client.clone();
                let slots = self.slots.clone();

                Task::future(async move {
                    let outcome = flow::execute(client.as_ref(), &submission, &slots).await;
                    Message::Finished(submission.session_id, outcome)
                })
            }
            Message::Finished(session_id, outcome) => {
                if self.flow.finish(&session_id, outcome, &mut self.history) {
                    self.show_judge = false;
                }
                Task::none()
            }
            Message::NewAnalysis => {
                self.flow.reset();
                self.description = text_editor::Content::new();
                self.targets = text_editor::Content::new();
                self.contact = None;
                self.notice = None;
                self.show_judge = false;
                Task::none()
            }
            Message::ToggleHistory => {
                self.show_history = !self.show_history;
                Task::none()
            }
            Message::SelectEntry(id) => {
                if let Some(entry) = self.history.get(&id).cloned() {
                    if self.flow.select(&entry) {
                        self.show_judge = false;
                        self.contact = None;
                        self.notice = None;
                    }
                }
                Task::none()
            }
            Message::RemoveEntry(id) => {
                self.history.remove(&id);
                Task::none()
            }
            Message::ClearHistory => {
                self.history.clear();
                Task::none()
            }
            Message::ToggleJudge => {
                self.show_judge = !self.show_judge;
                Task::none()
            }
            Message::CopyEntry => match self.flow.active_entry() {
                Some(entry) => {
                    let contents = export::entry_to_clipboard_text(entry);
                    self.notice = Some("In die Zwischenablage kopiert.".to_string());
                    clipboard::write(contents)
                }
                None => Task::none(),
            },
            Message::ExportEntry => {
                if let Some(entry) = self.flow.active_entry() {
                    let dir = self.config.storage.export_dir();
                    self.notice = Some(match export::write_markdown(entry, &dir) {
                        Ok(path) => format!("Exportiert nach {}", path.display()),
                        Err(e) => format!("Export fehlgeschlagen: {:#}", e),
                    });
                }
                Task::none()
            }
            Message::OpenContact => {
                self.contact = Some(ContactForm::default());
                Task::none()
            }
            Message::CloseContact => {
                self.contact = None;
                Task::none()
            }
            Message::ContactName(value) => {
                if let Some(form) = self.contact.as_mut() {
                    form.name = value;
                }
                Task::none()
            }
            Message::ContactEmail(value) => {
                if let Some(form) = self.contact.as_mut() {
                    form.email = value;
                }
                Task::none()
            }
            Message::ContactMessage(value) => {
                if let Some(form) = self.contact.as_mut() {
                    form.message = value;
                }
                Task::none()
            }
            Message::SendContact => {
                let (Some(form), Some(entry)) = (self.contact.as_mut(), self.flow.active_entry()) else {
                    return Task::none();
                };
                let request = ContactRequest::for_entry(&form.name, &form.email, &form.message, entry);
                form.errors.clear();
                form.failure = None;
                match self.contacts.submit(request) {
                    Ok(id) => form.sent = Some(id),
                    Err(ContactError::Invalid(errors)) => form.errors = errors,
                    Err(e) => form.failure = Some(e.to_string()),
                }
                Task::none()
            }
            Message::Tick => {
                if self.flow.is_loading() {
                    self.loading_frame = (self.loading_frame + 1) % 80;
                }
                Task::none()
            }
            Message::Escape => {
                if self.contact.is_some() {
                    self.contact = None;
                } else if self.show_history {
                    self.show_history = false;
                }
                Task::none()
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.flow.is_loading() {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) = event
            {
                Some(Message::Escape)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let header = row![
            text("Agent4Agents").size(28),
            iced::widget::horizontal_space(),
            button(text(format!("Verlauf ({})", self.history.len())).size(14))
                .on_press(Message::ToggleHistory)
                .style(button::secondary)
                .padding(10),
        ]
        .align_y(alignment::Vertical::Center);

        let body: Element<Message> = match self.flow.phase() {
            Phase::Result => self.result_view(),
            Phase::Form | Phase::Loading { .. } => self.form_view(),
        };

        let mut main = column![header, body].spacing(20).padding(20).width(Length::Fill);
        if self.show_history {
            main = main.push(self.history_view());
        }

        let mut footer = column![text("KI-generierte Inhalte. Bitte wichtige Informationen verifizieren.").size(12)]
            .spacing(4)
            .padding(Padding::from([10, 20]));
        if let Some(notice) = &self.notice {
            footer = footer.push(text(notice.clone()).size(12));
        } else if let Some(last) = diagnostics::headline(5) {
            let warning = last.is_warning();
            footer = footer.push(text(last.status_line()).size(12).style(move |theme| {
                if warning {
                    text::danger(theme)
                } else {
                    text::secondary(theme)
                }
            }));
        }

        container(column![scrollable(main).height(Length::Fill), footer])
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn form_view(&self) -> Element<Message> {
        let loading = self.flow.is_loading();
        let form = self.flow.form();

        let mut description = text_editor(&self.description)
            .placeholder("Beschreibe deinen Use Case...")
            .height(Length::Fixed(160.0));
        let mut targets = text_editor(&self.targets)
            .placeholder("z.B. SAP, Salesforce, interne REST-APIs, Datenbanken...")
            .height(Length::Fixed(80.0));
        if !loading {
            description = description.on_action(Message::DescriptionEdited);
            targets = targets.on_action(Message::TargetsEdited);
        }

        let ecosystem = pick_list(
            MODEL_ECOSYSTEMS,
            find_choice(MODEL_ECOSYSTEMS, &form.preferred_model_ecosystem),
            Message::EcosystemSelected,
        )
        .placeholder("Auswählen...")
        .width(Length::Fill);
        let channel = pick_list(
            INTERACTION_CHANNELS,
            find_choice(INTERACTION_CHANNELS, &form.interaction_channel),
            Message::ChannelSelected,
        )
        .placeholder("Auswählen...")
        .width(Length::Fill);

        let buttons = row![
            iced::widget::horizontal_space(),
            button(text("Zurücksetzen"))
                .on_press_maybe((!loading).then_some(Message::NewAnalysis))
                .style(button::secondary)
                .padding(10),
            button(text(if loading { "Wird angefragt..." } else { "Empfehlung anfordern" }))
                .on_press_maybe((!loading).then_some(Message::Submit))
                .padding(10),
        ]
        .spacing(10);

        let mut content = column![
            text("Beschreibe deinen Use Case strukturiert, um das passende Framework für deine Agentic-AI-Anwendung zu finden.").size(15),
            text("Use Case Beschreibung*").size(16),
            description,
            text("Beschreibe den gesamten Geschäftsprozess, wo welche Daten vorliegen, die beteiligten Systeme und das Geschäftsziel. (Min 300 Zeichen)").size(12),
            text("Welches Large Language Model möchtest du benutzen?").size(16),
            ecosystem,
            text("Interaktionskanal*").size(16),
            channel,
            text("Integration Targets").size(16),
            targets,
            buttons,
        ]
        .spacing(10);

        if let Some(error) = self.flow.error() {
            content = content.push(
                container(column![
                    text("Fehler").size(18).style(text::danger),
                    text(error.to_string()).style(text::danger),
                ])
                .padding(15)
                .width(Length::Fill)
                .style(container::bordered_box),
            );
        }

        if loading {
            let frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
            content = content.push(
                container(
                    row![
                        text(frames[self.loading_frame % frames.len()]).size(24),
                        text("Empfehlung wird generiert...").size(15),
                    ]
                    .spacing(10)
                    .align_y(alignment::Vertical::Center),
                )
                .width(Length::Fill)
                .align_x(alignment::Horizontal::Center)
                .padding(20),
            );
        }

        content.into()
    }

    fn result_view(&self) -> Element<Message> {
        let Some(entry) = self.flow.active_entry() else {
            return text("Keine Empfehlung ausgewählt.").into();
        };
        let r = &entry.recommendation;

        let mut card = column![
            text(format!("Empfohlenes Framework: {}", r.framework)).size(24),
            text(format!(
                "Ease of Use: {}   ·   KI notwendig: {}",
                r.ease_of_use,
                if r.ki_notwendig { "Ja" } else { "Nein" }
            ))
            .size(14),
            text(r.summary.clone()).size(16),
            text("Begründung").size(18),
            text(r.reasoning.clone()).size(15),
        ]
        .spacing(10);

        if let Some(alt) = r.alternative() {
            card = card.push(text("Alternative ohne KI").size(18));
            card = card.push(text(alt.to_string()).size(15));
        }

        if let Some(judge) = &entry.judge_evaluation {
            let marker = if self.show_judge { "▾" } else { "▸" };
            card = card.push(
                button(text(format!("{} Qualitätsbewertung (Judge)  {}", marker, judge.score_label())))
                    .on_press(Message::ToggleJudge)
                    .style(button::text),
            );
            if self.show_judge {
                card = card.push(text(format!("Framework Fit: {}", judge.framework_fit)).size(14));
                card = card.push(
                    text(format!(
                        "Ease of Use realistisch: {}",
                        if judge.ease_of_use_realistic { "Ja" } else { "Nein" }
                    ))
                    .size(14),
                );
                card = card.push(bullets("Stärken", &judge.strengths));
                card = card.push(bullets("Schwächen", &judge.weaknesses));
                card = card.push(bullets("Verbesserungsvorschläge", &judge.improvement_suggestions));
            }
        }

        let actions = row![
            button(text("Kopieren")).on_press(Message::CopyEntry).padding(10),
            button(text("Als Markdown exportieren")).on_press(Message::ExportEntry).padding(10),
            button(text("Experten kontaktieren")).on_press(Message::OpenContact).padding(10),
            iced::widget::horizontal_space(),
            button(text("Neue Analyse"))
                .on_press(Message::NewAnalysis)
                .style(button::secondary)
                .padding(10),
        ]
        .spacing(10);
        card = card.push(actions);

        if let Some(form) = &self.contact {
            card = card.push(contact_view(form, entry));
        }

        container(card)
            .padding(20)
            .width(Length::Fill)
            .style(container::bordered_box)
            .into()
    }

    fn history_view(&self) -> Element<Message> {
        let mut list = Column::new().spacing(8);
        if self.history.is_empty() {
            list = list.push(text("Noch keine Empfehlungen vorhanden.").size(14));
        }

        let active = self.flow.active_entry().map(|e| e.id.as_str());
        for entry in self.history.entries() {
            list = list.push(history_row(entry, active == Some(entry.id.as_str())));
        }

        let mut header = row![text("Letzte Empfehlungen").size(18), iced::widget::horizontal_space()].spacing(10);
        if !self.history.is_empty() {
            header = header.push(
                button(text("Alle löschen").size(13))
                    .on_press(Message::ClearHistory)
                    .style(button::danger),
            );
        }

        container(column![header, list].spacing(10))
            .padding(15)
            .width(Length::Fill)
            .style(container::bordered_box)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}

fn bullets<'a>(title: &str, items: &[String]) -> Element<'a, Message> {
    let mut list = Column::new().spacing(2).push(text(title.to_string()).size(15));
    if items.is_empty() {
        list = list.push(text("- Keine").size(14));
    }
    for item in items {
        list = list.push(text(format!("- {}", item)).size(14));
    }
    list.into()
}

fn history_row<'a>(entry: &HistoryEntry, is_active: bool) -> Element<'a, Message> {
    let label = format!(
        "{}{}  ·  {}",
        if is_active { "▶ " } else { "" },
        entry.recommendation.framework,
        export::display_date(&entry.timestamp)
    );
    row![
        button(text(label).size(14))
            .on_press(Message::SelectEntry(entry.id.clone()))
            .style(button::text)
            .width(Length::Fill),
        button(text("✕").size(14))
            .on_press(Message::RemoveEntry(entry.id.clone()))
            .style(button::text),
    ]
    .spacing(5)
    .into()
}

fn contact_view<'a>(form: &'a ContactForm, entry: &HistoryEntry) -> Element<'a, Message> {
    if let Some(id) = &form.sent {
        return container(column![
            text("Nachricht gesendet!").size(18).style(text::success),
            text(format!("Referenz: {}", id)).size(12),
            button(text("Schließen")).on_press(Message::CloseContact),
        ]
        .spacing(8))
        .padding(15)
        .style(container::bordered_box)
        .into();
    }

    let mut fields = column![
        text("Expertenteam kontaktieren").size(18),
        text(format!(
            "Deine Empfehlung für {} wird automatisch als Kontext mitgesendet.",
            entry.recommendation.framework
        ))
        .size(13),
        text_input("Name", &form.name).on_input(Message::ContactName).padding(8),
    ]
    .spacing(8);
    if let Some(err) = form.error_for("name") {
        fields = fields.push(text(err.to_string()).size(12).style(text::danger));
    }
    fields = fields.push(text_input("E-Mail", &form.email).on_input(Message::ContactEmail).padding(8));
    if let Some(err) = form.error_for("email") {
        fields = fields.push(text(err.to_string()).size(12).style(text::danger));
    }
    fields = fields.push(
        text_input("Nachricht (optional)", &form.message)
            .on_input(Message::ContactMessage)
            .padding(8),
    );
    if let Some(failure) = &form.failure {
        fields = fields.push(text(failure.clone()).size(12).style(text::danger));
    }
    fields = fields.push(
        row![
            iced::widget::horizontal_space(),
            button(text("Abbrechen"))
                .on_press(Message::CloseContact)
                .style(button::secondary),
            button(text("Senden")).on_press(Message::SendContact),
        ]
        .spacing(10),
    );

    container(fields).padding(15).style(container::bordered_box).into()
}
