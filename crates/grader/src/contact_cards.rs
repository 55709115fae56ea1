//! Contact cards assignment
//!
//! Eight dependent steps, one point each. Later steps reuse cards and values
//! left behind by earlier ones, so a failure early on tends to cascade.

use cardgrade_common::image_to_data_url;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

use crate::browser::{ElementRef, Locator};
use crate::check;
use crate::error::GradeResult;
use crate::page::Page;
use crate::runner::{Award, Step, StepError, StepFuture, StepResult};
use crate::users::{self, TestUser};

const CONTACT: &str = "div.contact";
const NAME_INPUT: &str = "input[name='name']";
const AFFILIATION_INPUT: &str = "input[name='affiliation']";
const DESCRIPTION_INPUT: &str = "textarea[name='description']";
const TITLE: &str = "h1.title";
const CONTAINER: &str = "div.container";
const ADD_BUTTON: &str = "button#add_button";
const PHOTO_FIGURE: &str = "figure.photo";
const PHOTO_IMG: &str = "img.photo";
const MEDIA_CONTENT: &str = "div.media-content";
const FILE_INPUT: &str = "input[type='file']";
const DELETE_BUTTON: &str = "i.delete-button";

/// Number of synthetic users the scenario needs
pub const USER_COUNT: usize = 3;

/// Values typed by one step and verified by a later one
#[derive(Debug, Clone, Default)]
pub struct Remembered {
    pub name: Option<String>,
    pub affiliation: Option<String>,
    pub description: Option<String>,
    pub second_name: Option<String>,
    pub second_affiliation: Option<String>,
    pub user2_name: Option<String>,
}

/// The three editable controls of one card
struct CardFields {
    name: ElementRef,
    affiliation: ElementRef,
    description: ElementRef,
}

/// Shared state of a contact cards grading run
pub struct ContactCards<'p> {
    page: &'p mut Page,
    users: [TestUser; USER_COUNT],
    images: Vec<PathBuf>,
    rng: StdRng,
    pub remembered: Remembered,
}

impl<'p> ContactCards<'p> {
    pub fn new(page: &'p mut Page, images: Vec<PathBuf>) -> Self {
        Self::with_rng(page, images, StdRng::from_entropy())
    }

    /// Same as `new` with a caller-chosen image picker
    pub fn with_rng(page: &'p mut Page, images: Vec<PathBuf>, rng: StdRng) -> Self {
        Self {
            page,
            users: [
                TestUser::generate(),
                TestUser::generate(),
                TestUser::generate(),
            ],
            images,
            rng,
            remembered: Remembered::default(),
        }
    }

    pub fn users(&self) -> &[TestUser] {
        &self.users
    }

    /// Register every synthetic user
    pub async fn setup(&mut self) -> GradeResult<()> {
        for user in &self.users {
            users::register(self.page, user).await?;
        }
        Ok(())
    }

    async fn login(&mut self, user: usize) -> GradeResult<()> {
        let user = self.users[user].clone();
        users::login(self.page, &user).await?;
        self.page.navigate("index").await
    }

    async fn contacts(&mut self) -> GradeResult<Vec<ElementRef>> {
        self.page.find_all(&Locator::css(CONTACT)).await
    }

    async fn contacts_expecting(&mut self, count: usize) -> GradeResult<Vec<ElementRef>> {
        self.page.wait_for_count(&Locator::css(CONTACT), count).await
    }

    async fn contact(&mut self, index: usize) -> Result<ElementRef, StepError> {
        let contacts = self.contacts().await?;
        contacts.get(index).cloned().ok_or_else(|| {
            StepError::Assertion(format!(
                "expected a contact at position {}, found {}",
                index,
                contacts.len()
            ))
        })
    }

    async fn fields(&mut self, contact: &ElementRef) -> GradeResult<CardFields> {
        Ok(CardFields {
            name: self.page.find_in(contact, &Locator::css(NAME_INPUT)).await?,
            affiliation: self
                .page
                .find_in(contact, &Locator::css(AFFILIATION_INPUT))
                .await?,
            description: self
                .page
                .find_in(contact, &Locator::css(DESCRIPTION_INPUT))
                .await?,
        })
    }

    async fn click_css(&mut self, selector: &str) -> GradeResult<()> {
        let element = self.page.find(&Locator::css(selector)).await?;
        self.page.click(&element).await
    }

    async fn add_contact(&mut self) -> GradeResult<()> {
        self.click_css(ADD_BUTTON).await
    }

    /// Click a control, type into it and click `blur` to commit
    async fn edit(&mut self, field: &ElementRef, text: &str, blur: &ElementRef) -> GradeResult<()> {
        self.page.click(field).await?;
        self.page.send_keys(field, text).await?;
        self.page.click(blur).await
    }

    async fn delete_first(&mut self) -> Result<(), StepError> {
        let contact = self.contact(0).await?;
        let delete = self
            .page
            .find_in(&contact, &Locator::css(DELETE_BUTTON))
            .await?;
        self.page.click(&delete).await?;
        Ok(())
    }

    fn pick_image(&mut self) -> Result<PathBuf, StepError> {
        let image = self
            .images
            .choose(&mut self.rng)
            .cloned()
            .ok_or_else(|| StepError::Assertion("no sample images to upload".to_string()))?;
        Ok(std::fs::canonicalize(&image).unwrap_or(image))
    }
}

fn fresh_value() -> String {
    Uuid::new_v4().to_string()
}

fn recall(value: &Option<String>, what: &str) -> Result<String, StepError> {
    value.clone().ok_or_else(|| {
        StepError::Assertion(format!("no {} was recorded by an earlier step", what))
    })
}

/// Exercise click-to-edit and blur-to-commit on one control
async fn check_edit_cycle(
    cx: &mut ContactCards<'_>,
    field: &ElementRef,
    text: &str,
    blur: &ElementRef,
    labels: [&str; 3],
) -> Result<(), StepError> {
    cx.page.click(field).await?;
    let readonly = cx.page.wait_for_readonly(field, false).await?;
    check!(!readonly, "{}", labels[0]);

    cx.page.send_keys(field, text).await?;
    cx.page.click(blur).await?;

    let value = cx.page.wait_for_value(field, text).await?;
    check!(value == text, "{}", labels[1]);
    let readonly = cx.page.wait_for_readonly(field, true).await?;
    check!(readonly, "{}", labels[2]);
    Ok(())
}

async fn add_empty_contact(cx: &mut ContactCards<'_>) -> StepResult {
    cx.login(0).await?;

    let contacts = cx.contacts().await?;
    check!(contacts.is_empty(), "S1-1 There should be no contacts initially.");

    cx.add_contact().await?;
    let contacts = cx.contacts_expecting(1).await?;
    check!(contacts.len() == 1, "S1-2 A contact has been added.");

    let fields = cx.fields(&contacts[0]).await?;
    check!(
        cx.page.value(&fields.name).await?.is_empty(),
        "S1-3 The name should initially be empty."
    );
    check!(
        cx.page.value(&fields.affiliation).await?.is_empty(),
        "S1-4 The affiliation should initially be empty."
    );
    check!(
        cx.page.value(&fields.description).await?.is_empty(),
        "S1-5 The description should initially be empty."
    );

    Ok(Award::new(1, "Empty item added correctly."))
}

async fn edit_name_and_affiliation(cx: &mut ContactCards<'_>) -> StepResult {
    let contact = cx.contact(0).await?;
    let title = cx.page.find(&Locator::css(TITLE)).await?;
    let fields = cx.fields(&contact).await?;

    check!(
        cx.page.is_readonly(&fields.name).await?,
        "S2-1 The name should be readonly initially."
    );
    check!(
        cx.page.is_readonly(&fields.affiliation).await?,
        "S2-2 The affiliation should be readonly initially."
    );

    let name = fresh_value();
    let affiliation = fresh_value();
    cx.remembered.name = Some(name.clone());
    cx.remembered.affiliation = Some(affiliation.clone());

    check_edit_cycle(
        cx,
        &fields.name,
        &name,
        &title,
        [
            "S2-3 The name should be editable after clicking.",
            "S2-4 The name should be editable.",
            "S2-5 The name should be readonly after losing focus.",
        ],
    )
    .await?;

    check_edit_cycle(
        cx,
        &fields.affiliation,
        &affiliation,
        &title,
        [
            "S2-6 The affiliation should be editable after clicking.",
            "S2-7 The affiliation should be preserved.",
            "S2-8 The affiliation should be readonly after losing focus.",
        ],
    )
    .await?;

    check!(
        cx.page.value(&fields.name).await? == name,
        "S2-9 The name should be again preserved."
    );

    Ok(Award::new(
        1,
        "Name and affiliation change to editable when clicked, and to read-only when they lose focus.",
    ))
}

async fn edit_description(cx: &mut ContactCards<'_>) -> StepResult {
    let contact = cx.contact(0).await?;
    let title = cx.page.find(&Locator::css(TITLE)).await?;
    let fields = cx.fields(&contact).await?;

    check!(
        cx.page.is_readonly(&fields.description).await?,
        "S3-1 The description should be readonly initially."
    );

    let description = fresh_value();
    cx.remembered.description = Some(description.clone());

    check_edit_cycle(
        cx,
        &fields.description,
        &description,
        &title,
        [
            "S3-2 The description should be editable after clicking.",
            "S3-3 The description could not be edited.",
            "S3-4 The description should be readonly after losing focus.",
        ],
    )
    .await?;

    Ok(Award::new(
        1,
        "Description changes to editable when clicked, and to read-only when it loses focus.",
    ))
}

async fn survives_refresh(cx: &mut ContactCards<'_>) -> StepResult {
    let name = recall(&cx.remembered.name, "name")?;
    let affiliation = recall(&cx.remembered.affiliation, "affiliation")?;
    let description = recall(&cx.remembered.description, "description")?;

    cx.page.refresh().await?;
    cx.contacts_expecting(1).await?;
    let contact = cx.contact(0).await?;
    let fields = cx.fields(&contact).await?;

    check!(
        cx.page.wait_for_value(&fields.name, &name).await? == name,
        "S4-1 The name should be preserved after refresh."
    );
    check!(
        cx.page.wait_for_value(&fields.affiliation, &affiliation).await? == affiliation,
        "S4-2 The affiliation should be preserved after refresh."
    );
    check!(
        cx.page.wait_for_value(&fields.description, &description).await? == description,
        "S4-3 The description should be preserved after refresh."
    );

    Ok(Award::new(1, "The data is preserved after refresh."))
}

async fn multiple_contacts(cx: &mut ContactCards<'_>) -> StepResult {
    let name = recall(&cx.remembered.name, "name")?;
    let affiliation = recall(&cx.remembered.affiliation, "affiliation")?;
    let description = recall(&cx.remembered.description, "description")?;

    cx.add_contact().await?;
    let contacts = cx.contacts_expecting(2).await?;
    check!(contacts.len() == 2, "S5-0 A second contact should have been added.");

    // The original contact comes first and is untouched.
    let first = cx.fields(&contacts[0]).await?;
    check!(
        cx.page.value(&first.name).await? == name,
        "S5-1 The name should be preserved after refresh."
    );
    check!(
        cx.page.value(&first.affiliation).await? == affiliation,
        "S5-2 The affiliation should be preserved after refresh."
    );
    check!(
        cx.page.value(&first.description).await? == description,
        "S5-3 The description should be preserved after refresh."
    );

    let second = cx.fields(&contacts[1]).await?;
    let second_name = fresh_value();
    let second_affiliation = fresh_value();
    cx.remembered.second_name = Some(second_name.clone());
    cx.remembered.second_affiliation = Some(second_affiliation.clone());

    // Clicking the affiliation blurs the name, and clicking the name again
    // blurs the affiliation.
    cx.page.click(&second.name).await?;
    cx.page.send_keys(&second.name, &second_name).await?;
    cx.edit(&second.affiliation, &second_affiliation, &second.name)
        .await?;
    cx.page.settle().await;

    cx.page.refresh().await?;
    let contacts = cx.contacts_expecting(2).await?;
    check!(contacts.len() == 2, "S5-0 Both contacts should survive a refresh.");
    let first = cx.fields(&contacts[0]).await?;
    let second = cx.fields(&contacts[1]).await?;

    check!(
        cx.page.wait_for_value(&second.name, &second_name).await? == second_name,
        "S5-4 Name 1 is ok."
    );
    check!(
        cx.page.wait_for_value(&second.affiliation, &second_affiliation).await? == second_affiliation,
        "S5-5 Affiliation 1 is ok."
    );
    check!(
        cx.page.value(&first.name).await? == name,
        "S5-6 Name 0 is ok."
    );
    check!(
        cx.page.value(&first.affiliation).await? == affiliation,
        "S5-7 Affiliation 0 is ok."
    );

    Ok(Award::new(
        1,
        "The data is preserved after refresh even when there are multiple items.",
    ))
}

async fn upload_images(cx: &mut ContactCards<'_>) -> StepResult {
    cx.page.refresh().await?;
    let contacts = cx.contacts().await?;
    check!(
        !contacts.is_empty(),
        "S6-0 There should be contacts to attach images to."
    );

    let mut expected = Vec::with_capacity(contacts.len());
    for contact in &contacts {
        let figure = cx.page.find_in(contact, &Locator::css(PHOTO_FIGURE)).await?;
        let content = cx.page.find_in(contact, &Locator::css(MEDIA_CONTENT)).await?;
        cx.page.click(&figure).await?;

        let input = cx.page.find(&Locator::css(FILE_INPUT)).await?;
        let image = cx.pick_image()?;
        debug!("Uploading {}", image.display());
        cx.page
            .send_keys(&input, &image.to_string_lossy())
            .await?;
        // Losing focus triggers the upload.
        cx.page.click(&content).await?;
        cx.page.settle().await;

        expected.push(image_to_data_url(&image)?);
    }

    cx.page.refresh().await?;
    let contacts = cx.contacts_expecting(expected.len()).await?;
    check!(
        contacts.len() == expected.len(),
        "S6-2 Expected {} contacts after refresh, found {}.",
        expected.len(),
        contacts.len()
    );
    for (i, (contact, url)) in contacts.iter().zip(&expected).enumerate() {
        let img = cx.page.find_in(contact, &Locator::css(PHOTO_IMG)).await?;
        let src = cx.page.wait_for_attr(&img, "src", url).await?;
        check!(
            src.as_deref() == Some(url.as_str()),
            "S6-1 The image {} should be there.",
            i
        );
    }

    Ok(Award::new(
        1,
        "The image can be changed by clicking on the figure tag, and the new image is saved in the database.",
    ))
}

async fn users_are_isolated(cx: &mut ContactCards<'_>) -> StepResult {
    cx.login(1).await?;
    let contacts = cx.contacts_expecting(0).await?;
    check!(contacts.is_empty(), "S7-1 User 2 should not see any contacts.");

    cx.login(0).await?;
    let contacts = cx.contacts_expecting(2).await?;
    check!(contacts.len() == 2, "S7-2 User 1 should see two contacts.");

    cx.login(1).await?;
    cx.add_contact().await?;
    cx.contacts_expecting(1).await?;
    let contact = cx.contact(0).await?;
    let name_input = cx.page.find_in(&contact, &Locator::css(NAME_INPUT)).await?;
    let container = cx.page.find(&Locator::css(CONTAINER)).await?;

    let user2_name = fresh_value();
    cx.remembered.user2_name = Some(user2_name.clone());
    cx.edit(&name_input, &user2_name, &container).await?;
    cx.page.settle().await;

    cx.page.refresh().await?;
    let contacts = cx.contacts_expecting(1).await?;
    check!(contacts.len() == 1, "S7-3 User 2 should see one contact.");
    let name_input = cx
        .page
        .find_in(&contacts[0], &Locator::css(NAME_INPUT))
        .await?;
    check!(
        cx.page.wait_for_value(&name_input, &user2_name).await? == user2_name,
        "S7-4 User 2 should see the new contact."
    );

    Ok(Award::new(1, "Users see their own contacts."))
}

async fn delete_contacts(cx: &mut ContactCards<'_>) -> StepResult {
    cx.login(0).await?;
    let contacts = cx.contacts_expecting(2).await?;
    check!(contacts.len() == 2, "S8-1 User 1 should see two contacts.");

    cx.delete_first().await?;
    let contacts = cx.contacts_expecting(1).await?;
    check!(
        contacts.len() == 1,
        "S8-2 User 1 should see one contact; it sees {}.",
        contacts.len()
    );

    cx.page.refresh().await?;
    let contacts = cx.contacts_expecting(1).await?;
    check!(contacts.len() == 1, "S8-3 User 1 should see one contact after refresh.");

    cx.login(1).await?;
    let contacts = cx.contacts_expecting(1).await?;
    check!(contacts.len() == 1, "S8-4 User 2 should see one contact.");

    cx.login(2).await?;
    let contacts = cx.contacts_expecting(0).await?;
    check!(contacts.is_empty(), "S8-5 User 3 should see no contacts.");

    cx.login(1).await?;
    cx.contacts_expecting(1).await?;
    cx.delete_first().await?;
    let contacts = cx.contacts_expecting(0).await?;
    check!(contacts.is_empty(), "S8-6 User 2 should see no contacts.");

    cx.login(0).await?;
    let contacts = cx.contacts_expecting(1).await?;
    check!(contacts.len() == 1, "S8-7 User 1 should see one contact.");

    Ok(Award::new(1, "Deleting contacts works properly."))
}

macro_rules! step {
    ($name:literal, $f:ident) => {{
        fn run<'a>(cx: &'a mut ContactCards<'_>) -> StepFuture<'a> {
            Box::pin($f(cx))
        }
        Step::new($name, run)
    }};
}

/// The scenario's steps in execution order
pub fn steps<'p>() -> Vec<Step<ContactCards<'p>>> {
    vec![
        step!("step1", add_empty_contact),
        step!("step2", edit_name_and_affiliation),
        step!("step3", edit_description),
        step!("step4", survives_refresh),
        step!("step5", multiple_contacts),
        step!("step6", upload_images),
        step!("step7", users_are_isolated),
        step!("step8", delete_contacts),
    ]
}

/// Points available across all steps
pub const MAX_POINTS: u32 = 8;
