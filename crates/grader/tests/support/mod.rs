//! In-process stand-in for the contact cards app
//!
//! Implements `Browser` by simulating the app's pages on top of a
//! `ContactStore`, so whole grading runs execute without a server or browser.
//! `Quirks` switch on the classic student bugs.

#![allow(dead_code)]

use async_trait::async_trait;
use cardgrade::{Browser, ElementRef, GradeError, GradeResult, Locator};
use cardgrade_common::{image_to_data_url, ContactField, ContactStore, Owner};
use std::collections::HashMap;
use std::path::Path;

const PLACEHOLDER_IMAGE: &str = "https://bulma.io/images/placeholders/96x96.png";

/// Bugs the fake app can be told to have
#[derive(Debug, Clone, Copy, Default)]
pub struct Quirks {
    /// Every user sees and edits the same cards
    pub shared_cards: bool,
    /// Field edits are shown but never saved
    pub drops_edits: bool,
    /// The index page has no add button
    pub no_add_button: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Blank,
    Register,
    Login,
    Index,
}

#[derive(Debug, Clone)]
struct CardView {
    id: i64,
    name: String,
    affiliation: String,
    description: String,
    image: String,
}

impl CardView {
    fn text(&self, field: ContactField) -> &str {
        match field {
            ContactField::Name => &self.name,
            ContactField::Affiliation => &self.affiliation,
            ContactField::Description => &self.description,
            ContactField::Image => &self.image,
        }
    }

    fn text_mut(&mut self, field: ContactField) -> &mut String {
        match field {
            ContactField::Name => &mut self.name,
            ContactField::Affiliation => &mut self.affiliation,
            ContactField::Description => &mut self.description,
            ContactField::Image => &mut self.image,
        }
    }
}

/// What an element id points at
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    AuthField(String),
    Submit,
    Title,
    Container,
    AddButton,
    FileInput,
    Card(i64),
    CardField(i64, ContactField),
    Figure(i64),
    Media(i64),
    Image(i64),
    Delete(i64),
}

impl Target {
    fn to_ref(&self) -> ElementRef {
        let id = match self {
            Target::AuthField(name) => format!("auth:{}", name),
            Target::Submit => "auth:submit".to_string(),
            Target::Title => "title".to_string(),
            Target::Container => "container".to_string(),
            Target::AddButton => "add".to_string(),
            Target::FileInput => "file".to_string(),
            Target::Card(id) => format!("card:{}", id),
            Target::CardField(id, field) => format!("card:{}:{}", id, field.column()),
            Target::Figure(id) => format!("card:{}:figure", id),
            Target::Media(id) => format!("card:{}:media", id),
            Target::Image(id) => format!("card:{}:img", id),
            Target::Delete(id) => format!("card:{}:delete", id),
        };
        ElementRef(id)
    }

    fn parse(element: &ElementRef) -> Option<Target> {
        let id = element.id();
        if let Some(name) = id.strip_prefix("auth:") {
            return Some(if name == "submit" {
                Target::Submit
            } else {
                Target::AuthField(name.to_string())
            });
        }
        match id {
            "title" => return Some(Target::Title),
            "container" => return Some(Target::Container),
            "add" => return Some(Target::AddButton),
            "file" => return Some(Target::FileInput),
            _ => {}
        }

        let rest = id.strip_prefix("card:")?;
        let mut parts = rest.splitn(2, ':');
        let card: i64 = parts.next()?.parse().ok()?;
        Some(match parts.next() {
            None => Target::Card(card),
            Some("figure") => Target::Figure(card),
            Some("media") => Target::Media(card),
            Some("img") => Target::Image(card),
            Some("delete") => Target::Delete(card),
            Some(column) => Target::CardField(card, column.parse().ok()?),
        })
    }
}

pub struct FakeApp {
    store: ContactStore,
    quirks: Quirks,
    accounts: HashMap<String, String>,
    session: Option<Owner>,
    view: View,
    form: HashMap<String, String>,
    cards: Vec<CardView>,
    focused: Option<(i64, ContactField)>,
    upload_target: Option<i64>,
    pub visited: Vec<String>,
}

impl FakeApp {
    pub fn new(quirks: Quirks) -> Self {
        Self::with_store(ContactStore::open_memory().unwrap(), quirks)
    }

    /// Fake app persisting into `store`; keep a clone to inspect it later
    pub fn with_store(store: ContactStore, quirks: Quirks) -> Self {
        Self {
            store,
            quirks,
            accounts: HashMap::new(),
            session: None,
            view: View::Blank,
            form: HashMap::new(),
            cards: Vec::new(),
            focused: None,
            upload_target: None,
            visited: Vec::new(),
        }
    }

    fn scope(&self) -> Option<Owner> {
        if self.quirks.shared_cards {
            self.session.as_ref().map(|_| Owner::new("everyone"))
        } else {
            self.session.clone()
        }
    }

    fn render(&mut self, view: View) -> GradeResult<()> {
        self.focused = None;
        self.upload_target = None;
        self.form.clear();

        self.view = match view {
            View::Index if self.session.is_none() => View::Login,
            other => other,
        };

        self.cards.clear();
        if self.view == View::Index {
            if let Some(owner) = self.scope() {
                for record in self.store.list(&owner)? {
                    self.cards.push(CardView {
                        id: record.id,
                        name: record.contact_name,
                        affiliation: record.contact_affiliation,
                        description: record.contact_description,
                        image: record.contact_image,
                    });
                }
            }
        }
        Ok(())
    }

    fn card(&self, id: i64) -> GradeResult<&CardView> {
        self.cards.iter().find(|c| c.id == id).ok_or_else(stale)
    }

    fn card_mut(&mut self, id: i64) -> GradeResult<&mut CardView> {
        self.cards.iter_mut().find(|c| c.id == id).ok_or_else(stale)
    }

    fn target(&self, element: &ElementRef) -> GradeResult<Target> {
        let target = Target::parse(element).ok_or_else(stale)?;
        let live = match &target {
            Target::AuthField(_) | Target::Submit => {
                matches!(self.view, View::Register | View::Login)
            }
            Target::FileInput => self.view == View::Index && self.upload_target.is_some(),
            Target::Title | Target::Container | Target::AddButton => self.view == View::Index,
            Target::Card(id)
            | Target::CardField(id, _)
            | Target::Figure(id)
            | Target::Media(id)
            | Target::Image(id)
            | Target::Delete(id) => self.cards.iter().any(|c| c.id == *id),
        };
        if live {
            Ok(target)
        } else {
            Err(stale())
        }
    }

    /// Commit the focused field, as the app does on blur
    fn blur(&mut self) -> GradeResult<()> {
        let Some((id, field)) = self.focused.take() else {
            return Ok(());
        };
        let value = self.card(id)?.text(field).to_string();
        if !self.quirks.drops_edits {
            if let Some(owner) = self.scope() {
                self.store.update_field(&owner, id, field, &value)?;
            }
        }
        Ok(())
    }

    fn submit(&mut self) -> GradeResult<()> {
        let email = self.form.get("email").cloned().unwrap_or_default();
        let password = self.form.get("password").cloned().unwrap_or_default();
        match self.view {
            View::Register => {
                if !email.is_empty()
                    && self.form.get("password_again") == Some(&password)
                {
                    self.accounts.insert(email, password);
                }
                self.render(View::Blank)
            }
            View::Login => {
                if self.accounts.get(&email) == Some(&password) && !password.is_empty() {
                    self.session = Some(Owner::new(email));
                    self.render(View::Index)
                } else {
                    self.render(View::Login)
                }
            }
            _ => Ok(()),
        }
    }

    fn matches(&self, scope: Option<&ElementRef>, locator: &Locator) -> GradeResult<Vec<Target>> {
        let scope = match scope {
            Some(element) => Some(self.target(element)?),
            None => None,
        };

        let found = match (self.view, &scope, locator) {
            (View::Register | View::Login, None, Locator::Name(name)) => {
                let fields: &[&str] = if self.view == View::Register {
                    &["email", "password", "password_again", "first_name", "last_name"]
                } else {
                    &["email", "password"]
                };
                if fields.contains(&name.as_str()) {
                    vec![Target::AuthField(name.clone())]
                } else {
                    vec![]
                }
            }
            (View::Register | View::Login, None, Locator::Css(css))
                if css == "input[type='submit']" =>
            {
                vec![Target::Submit]
            }
            (View::Index, None, Locator::Css(css)) => match css.as_str() {
                "div.contact" => self.cards.iter().map(|c| Target::Card(c.id)).collect(),
                "h1.title" => vec![Target::Title],
                "div.container" => vec![Target::Container],
                "button#add_button" if !self.quirks.no_add_button => vec![Target::AddButton],
                "input[type='file']" if self.upload_target.is_some() => vec![Target::FileInput],
                _ => vec![],
            },
            (View::Index, Some(Target::Card(id)), Locator::Css(css)) => {
                let id = *id;
                match css.as_str() {
                    "input[name='name']" => vec![Target::CardField(id, ContactField::Name)],
                    "input[name='affiliation']" => {
                        vec![Target::CardField(id, ContactField::Affiliation)]
                    }
                    "textarea[name='description']" => {
                        vec![Target::CardField(id, ContactField::Description)]
                    }
                    "figure.photo" => vec![Target::Figure(id)],
                    "div.media-content" => vec![Target::Media(id)],
                    "img.photo" => vec![Target::Image(id)],
                    "i.delete-button" => vec![Target::Delete(id)],
                    _ => vec![],
                }
            }
            _ => vec![],
        };
        Ok(found)
    }
}

fn stale() -> GradeError {
    GradeError::WebDriver {
        error: "stale element reference".to_string(),
        message: "element is not attached to the page document".to_string(),
    }
}

#[async_trait]
impl Browser for FakeApp {
    async fn goto(&mut self, url: &str) -> GradeResult<()> {
        self.visited.push(url.to_string());
        let view = if url.ends_with("/auth/register") {
            View::Register
        } else if url.ends_with("/auth/login") {
            View::Login
        } else if url.ends_with("/index") {
            View::Index
        } else {
            View::Blank
        };
        self.render(view)
    }

    async fn refresh(&mut self) -> GradeResult<()> {
        let view = self.view;
        self.render(view)
    }

    async fn find_all(
        &mut self,
        scope: Option<&ElementRef>,
        locator: &Locator,
    ) -> GradeResult<Vec<ElementRef>> {
        Ok(self
            .matches(scope, locator)?
            .iter()
            .map(Target::to_ref)
            .collect())
    }

    async fn click(&mut self, element: &ElementRef) -> GradeResult<()> {
        let target = self.target(element)?;

        if let Target::CardField(id, field) = target {
            if self.focused == Some((id, field)) {
                return Ok(());
            }
            self.blur()?;
            self.focused = Some((id, field));
            return Ok(());
        }
        self.blur()?;

        match target {
            Target::Submit => self.submit()?,
            Target::AddButton => {
                if let Some(owner) = self.scope() {
                    let record = self.store.add(&owner)?;
                    self.cards.push(CardView {
                        id: record.id,
                        name: String::new(),
                        affiliation: String::new(),
                        description: String::new(),
                        image: String::new(),
                    });
                }
            }
            Target::Figure(id) => self.upload_target = Some(id),
            Target::Delete(id) => {
                if let Some(owner) = self.scope() {
                    self.store.delete(&owner, id)?;
                }
                self.cards.retain(|c| c.id != id);
            }
            _ => {}
        }
        Ok(())
    }

    async fn send_keys(&mut self, element: &ElementRef, text: &str) -> GradeResult<()> {
        match self.target(element)? {
            Target::AuthField(name) => {
                self.form.entry(name).or_default().push_str(text);
            }
            Target::CardField(id, field) => {
                // Readonly controls ignore typing.
                if self.focused == Some((id, field)) {
                    self.card_mut(id)?.text_mut(field).push_str(text);
                }
            }
            Target::FileInput => {
                if let Some(id) = self.upload_target.take() {
                    let url = image_to_data_url(Path::new(text))?;
                    if let Some(owner) = self.scope() {
                        self.store.update_field(&owner, id, ContactField::Image, &url)?;
                    }
                    self.card_mut(id)?.image = url;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> GradeResult<Option<String>> {
        let value = match (self.target(element)?, name) {
            (Target::AuthField(field), "value") => {
                Some(self.form.get(&field).cloned().unwrap_or_default())
            }
            (Target::CardField(id, field), "value") => {
                Some(self.card(id)?.text(field).to_string())
            }
            (Target::CardField(id, field), "readonly") => {
                if self.focused == Some((id, field)) {
                    None
                } else {
                    Some("true".to_string())
                }
            }
            (Target::Image(id), "src") => {
                let image = &self.card(id)?.image;
                Some(if image.is_empty() {
                    PLACEHOLDER_IMAGE.to_string()
                } else {
                    image.clone()
                })
            }
            _ => None,
        };
        Ok(value)
    }

    async fn quit(&mut self) -> GradeResult<()> {
        self.render(View::Blank)
    }
}

/// Write a few small `.jpg` files to upload
pub fn sample_images(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut images = Vec::new();
    for (i, bytes) in [&b"\xff\xd8\xff\xe0first"[..], &b"\xff\xd8\xff\xe0second"[..]]
        .iter()
        .enumerate()
    {
        let path = dir.join(format!("sample{}.jpg", i));
        std::fs::write(&path, bytes).unwrap();
        images.push(path);
    }
    images
}
