//! Three-step adoption application wizard.
//!
//! Step 1 collects contact details, step 2 the applicant's experience and
//! home, step 3 the reason and two commitments. Each step is validated
//! before the next one opens; only a valid step 3 is submitted.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::accessors::Applications;
use crate::models::{ApplicationForm, CompanionTime, ExperienceLevel, WriteOutcome};

static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9\-+\s]{8,}$").expect("phone pattern is valid"));
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

pub const TOTAL_STEPS: u8 = 3;

/// Form fields that can carry a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Phone,
    Email,
    Job,
    Experience,
    Environment,
    CompanionTime,
    Reason,
    Commitment,
    Followup,
}

/// Result of pressing "next"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Moved on to this step
    Step(u8),
    /// The current step has errors
    Blocked,
    /// Step 3 is valid; call [`AdoptionWizard::submit`]
    ReadyToSubmit,
}

/// Result of pressing "back"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retreat {
    Step(u8),
    /// Back from step 1 leaves the wizard
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Short application reference for the confirmation dialog
    Submitted { reference: String },
    Failed(String),
    /// Not submitted: the form is invalid or already being submitted
    Rejected,
}

/// First 8 characters of an application id, upper-cased
pub fn display_reference(id: &str) -> String {
    id.chars().take(8).collect::<String>().to_uppercase()
}

fn require(errors: &mut BTreeMap<Field, &'static str>, field: Field, value: &str, message: &'static str) -> bool {
    if value.trim().is_empty() {
        errors.insert(field, message);
        false
    } else {
        true
    }
}

/// Errors for one step's fields
pub fn validate_step(step: u8, form: &ApplicationForm) -> BTreeMap<Field, &'static str> {
    let mut errors = BTreeMap::new();
    match step {
        1 => {
            require(&mut errors, Field::Name, &form.name, "請輸入您的姓名");
            if require(&mut errors, Field::Phone, &form.phone, "請輸入您的電話號碼")
                && !PHONE.is_match(&form.phone)
            {
                errors.insert(Field::Phone, "請輸入有效的電話號碼");
            }
            if require(&mut errors, Field::Email, &form.email, "請輸入您的電子郵件")
                && !EMAIL.is_match(&form.email)
            {
                errors.insert(Field::Email, "請輸入有效的電子郵件格式");
            }
            require(&mut errors, Field::Job, &form.job, "請輸入您的職業");
        }
        2 => {
            if form.experience.is_none() {
                errors.insert(Field::Experience, "請選擇您的養寵經驗");
            }
            require(&mut errors, Field::Environment, &form.environment, "請描述您的居住環境");
            if form.companion_time.is_none() {
                errors.insert(Field::CompanionTime, "請選擇每日陪伴時間");
            }
        }
        _ => {
            require(&mut errors, Field::Reason, &form.reason, "請分享您想領養的原因");
            if !form.commitment {
                errors.insert(Field::Commitment, "請確認您的領養承諾");
            }
            if !form.followup {
                errors.insert(Field::Followup, "請同意追蹤訪問條款");
            }
        }
    }
    errors
}

/// Wizard state for one pet
#[derive(Debug, Clone)]
pub struct AdoptionWizard {
    pet_id: String,
    step: u8,
    form: ApplicationForm,
    errors: BTreeMap<Field, &'static str>,
    submitting: bool,
}

impl AdoptionWizard {
    pub fn new(pet_id: &str) -> Self {
        Self {
            pet_id: pet_id.to_string(),
            step: 1,
            form: ApplicationForm::default(),
            errors: BTreeMap::new(),
            submitting: false,
        }
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn form(&self) -> &ApplicationForm {
        &self.form
    }

    pub fn errors(&self) -> &BTreeMap<Field, &'static str> {
        &self.errors
    }

    pub fn error(&self, field: Field) -> Option<&'static str> {
        self.errors.get(&field).copied()
    }

    /// True while a submission is in flight; the submit button is disabled
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Sets a text field and clears its error
    pub fn set_text(&mut self, field: Field, value: &str) {
        let slot = match field {
            Field::Name => &mut self.form.name,
            Field::Phone => &mut self.form.phone,
            Field::Email => &mut self.form.email,
            Field::Job => &mut self.form.job,
            Field::Environment => &mut self.form.environment,
            Field::Reason => &mut self.form.reason,
            other => {
                log::debug!("{:?} is not a text field", other);
                return;
            }
        };
        *slot = value.to_string();
        self.errors.remove(&field);
    }

    pub fn set_experience(&mut self, value: ExperienceLevel) {
        self.form.experience = Some(value);
        self.errors.remove(&Field::Experience);
    }

    pub fn set_companion_time(&mut self, value: CompanionTime) {
        self.form.companion_time = Some(value);
        self.errors.remove(&Field::CompanionTime);
    }

    pub fn set_commitment(&mut self, value: bool) {
        self.form.commitment = value;
        self.errors.remove(&Field::Commitment);
    }

    pub fn set_followup(&mut self, value: bool) {
        self.form.followup = value;
        self.errors.remove(&Field::Followup);
    }

    /// Whether every field of the current step has a value. Used to enable
    /// the "next" button; validation still runs on press.
    pub fn is_step_complete(&self) -> bool {
        let f = &self.form;
        match self.step {
            1 => ![&f.name, &f.phone, &f.email, &f.job].iter().any(|v| v.is_empty()),
            2 => f.experience.is_some() && !f.environment.is_empty() && f.companion_time.is_some(),
            _ => !f.reason.is_empty() && f.commitment && f.followup,
        }
    }

    /// Validates the current step and moves forward when it passes
    pub fn next(&mut self) -> Advance {
        self.errors = validate_step(self.step, &self.form);
        if !self.errors.is_empty() {
            return Advance::Blocked;
        }
        if self.step < TOTAL_STEPS {
            self.step += 1;
            Advance::Step(self.step)
        } else {
            Advance::ReadyToSubmit
        }
    }

    pub fn back(&mut self) -> Retreat {
        if self.step > 1 {
            self.step -= 1;
            self.errors.clear();
            Retreat::Step(self.step)
        } else {
            Retreat::Exit
        }
    }

    /// Starts a submission once step 3 validates.
    ///
    /// Returns the pet id and a copy of the form to send, or `None` when the
    /// form is invalid or a submission is already in flight. The wizard stays
    /// in the submitting state until [`finish_submit`](Self::finish_submit).
    pub fn begin_submit(&mut self) -> Option<(String, ApplicationForm)> {
        if self.submitting || self.step != TOTAL_STEPS || self.next() != Advance::ReadyToSubmit {
            return None;
        }
        self.submitting = true;
        Some((self.pet_id.clone(), self.form.clone()))
    }

    /// Ends the submission started by [`begin_submit`](Self::begin_submit)
    pub fn finish_submit(&mut self, outcome: WriteOutcome) -> Submission {
        if !self.submitting {
            return Submission::Rejected;
        }
        self.submitting = false;

        if outcome.success {
            let id = outcome.id.unwrap_or_default();
            log::info!("application submitted: {}", id);
            Submission::Submitted {
                reference: display_reference(&id),
            }
        } else {
            let error = outcome.error.unwrap_or_default();
            log::error!("failed to submit application: {}", error);
            Submission::Failed(format!("提交失敗：{}", error))
        }
    }

    /// Submits the application once step 3 validates
    pub async fn submit(&mut self, applications: &Applications) -> Submission {
        match self.begin_submit() {
            Some((pet_id, form)) => {
                let outcome = applications.submit(&pet_id, &form).await;
                self.finish_submit(outcome)
            }
            None => Submission::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Remote;

    fn contact(phone: &str) -> ApplicationForm {
        ApplicationForm {
            name: "王小明".into(),
            phone: phone.into(),
            email: "ming@example.com".into(),
            job: "工程師".into(),
            ..ApplicationForm::default()
        }
    }

    #[test]
    fn phone_needs_eight_digits_or_separators() {
        assert_eq!(
            validate_step(1, &contact("12345")).get(&Field::Phone),
            Some(&"請輸入有效的電話號碼")
        );
        assert!(validate_step(1, &contact("0912-345-678")).is_empty());
        assert!(validate_step(1, &contact("+886 912 345")).is_empty());
    }

    #[test]
    fn blank_fields_are_required() {
        let errors = validate_step(1, &ApplicationForm::default());
        assert_eq!(
            errors.keys().copied().collect::<Vec<_>>(),
            [Field::Name, Field::Phone, Field::Email, Field::Job]
        );
        assert_eq!(errors[&Field::Email], "請輸入您的電子郵件");

        let mut form = contact("0912345678");
        form.email = "ming@example".into();
        assert_eq!(validate_step(1, &form)[&Field::Email], "請輸入有效的電子郵件格式");
    }

    #[test]
    fn commitment_is_required() {
        let form = ApplicationForm {
            reason: "想給牠一個家".into(),
            commitment: false,
            followup: true,
            ..ApplicationForm::default()
        };
        let errors = validate_step(3, &form);
        assert_eq!(errors.keys().copied().collect::<Vec<_>>(), [Field::Commitment]);
    }

    #[test]
    fn back_from_first_step_exits() {
        let mut wizard = AdoptionWizard::new("p1");
        assert_eq!(wizard.back(), Retreat::Exit);
        assert_eq!(wizard.next(), Advance::Blocked);
        assert_eq!(wizard.error(Field::Name), Some("請輸入您的姓名"));

        wizard.set_text(Field::Name, "王小明");
        assert_eq!(wizard.error(Field::Name), None);
        wizard.set_text(Field::Phone, "0912-345-678");
        wizard.set_text(Field::Email, "ming@example.com");
        wizard.set_text(Field::Job, "工程師");
        assert!(wizard.is_step_complete());
        assert_eq!(wizard.next(), Advance::Step(2));

        assert_eq!(wizard.next(), Advance::Blocked);
        assert_eq!(wizard.back(), Retreat::Step(1));
        assert!(wizard.errors().is_empty());
    }

    #[test]
    fn reference_is_short_and_upper_case() {
        assert_eq!(display_reference("3f2a9c1e-77b0-4c1a"), "3F2A9C1E");
        assert_eq!(display_reference("abc"), "ABC");
    }

    #[tokio::test]
    async fn submit_refuses_an_invalid_form() {
        let mut wizard = AdoptionWizard::new("p1");
        let applications = Applications::new(Remote::unconfigured());
        assert_eq!(wizard.submit(&applications).await, Submission::Rejected);
    }

    fn completed_wizard() -> AdoptionWizard {
        let mut wizard = AdoptionWizard::new("p1");
        for (field, value) in [
            (Field::Name, "王小明"),
            (Field::Phone, "0912-345-678"),
            (Field::Email, "ming@example.com"),
            (Field::Job, "工程師"),
        ] {
            wizard.set_text(field, value);
        }
        assert_eq!(wizard.next(), Advance::Step(2));
        wizard.set_experience(ExperienceLevel::HasKeptPets);
        wizard.set_text(Field::Environment, "公寓，有陽台");
        wizard.set_companion_time(CompanionTime::FourToEight);
        assert_eq!(wizard.next(), Advance::Step(3));
        wizard.set_text(Field::Reason, "想給牠一個家");
        wizard.set_commitment(true);
        wizard.set_followup(true);
        wizard
    }

    #[tokio::test]
    async fn demo_submission_succeeds_without_backend() {
        let mut wizard = completed_wizard();
        let applications = Applications::new(Remote::unconfigured());
        match wizard.submit(&applications).await {
            Submission::Submitted { reference } => assert!(reference.starts_with("DEMO-")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!wizard.is_submitting());
    }

    #[tokio::test]
    async fn wizard_is_submitting_until_the_outcome_arrives() {
        let mut wizard = completed_wizard();
        let (pet_id, form) = wizard.begin_submit().unwrap();
        assert_eq!(pet_id, "p1");
        assert_eq!(form.reason, "想給牠一個家");
        assert!(wizard.is_submitting());
        assert_eq!(wizard.begin_submit(), None);

        let applications = Applications::new(Remote::unconfigured());
        assert_eq!(wizard.submit(&applications).await, Submission::Rejected);
        assert!(wizard.is_submitting());

        let outcome = applications.submit(&pet_id, &form).await;
        assert!(matches!(wizard.finish_submit(outcome), Submission::Submitted { .. }));
        assert!(!wizard.is_submitting());
    }

    #[test]
    fn failed_outcome_reopens_the_form() {
        let mut wizard = completed_wizard();
        assert!(wizard.begin_submit().is_some());
        assert_eq!(
            wizard.finish_submit(WriteOutcome::failed("網路錯誤")),
            Submission::Failed("提交失敗：網路錯誤".to_string())
        );
        assert!(!wizard.is_submitting());
        assert!(wizard.begin_submit().is_some());
    }
}
