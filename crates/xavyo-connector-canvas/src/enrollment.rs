//! Enrollment reconciliation
//!
//! Canvas has no membership attribute on users or courses: a user is a
//! student or teacher of a course because an enrollment record links the two
//! with the matching role. Both sides of that relation are exposed as
//! multi-valued attributes (`student_course_ids` on users, `student_ids` on
//! courses, and the teacher counterparts), so every membership change is
//! translated into enrollment creations and deactivations from the point of
//! view of an [`Anchor`].
//!
//! Planning is pure ([`plan_replace`], [`plan_add`], [`plan_remove`]); the
//! [`EnrollmentEngine`] reads enrollments and issues the planned calls one at
//! a time.

use serde_json::json;
use tracing::{debug, info, instrument, trace};

use xavyo_connector::error::{ConnectorError, ConnectorResult};

use crate::client::CanvasClient;
use crate::config::CanvasConfig;
use crate::model::{EnrollmentRecord, EnrollmentState};
use crate::pagination::{PageCursor, Pager};

/// Safety ceiling for reading one object's enrollments.
pub const ENROLLMENT_MAX_PAGES: u32 = 100;

const ENROLLMENT_PAGE_SIZE: u32 = 100;

/// Canvas `task` that deactivates an enrollment without deleting it.
const DEACTIVATE_TASK: &str = "inactivate";

/// Which membership set an enrollment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipRole {
    Student,
    Teacher,
}

impl std::fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MembershipRole::Student => f.write_str("student"),
            MembershipRole::Teacher => f.write_str("teacher"),
        }
    }
}

/// Configured role ids for the two membership sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleIds {
    pub student: u64,
    pub teacher: u64,
}

impl RoleIds {
    /// Membership set of a Canvas role id; other roles are not managed.
    pub fn classify(&self, role_id: u64) -> Option<MembershipRole> {
        if role_id == self.student {
            Some(MembershipRole::Student)
        } else if role_id == self.teacher {
            Some(MembershipRole::Teacher)
        } else {
            None
        }
    }

    /// Canvas role id of a membership set.
    pub fn role_id(&self, role: MembershipRole) -> u64 {
        match role {
            MembershipRole::Student => self.student,
            MembershipRole::Teacher => self.teacher,
        }
    }
}

/// The object whose enrollments are being viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    User(u64),
    Course(u64),
}

impl Anchor {
    /// Id of the anchor object.
    pub fn id(&self) -> u64 {
        match self {
            Anchor::User(id) | Anchor::Course(id) => *id,
        }
    }

    /// The id on the other side of an enrollment: the course for a user
    /// anchor, the user for a course anchor.
    pub fn counterpart(&self, enrollment: &Enrollment) -> u64 {
        match self {
            Anchor::User(_) => enrollment.course_id,
            Anchor::Course(_) => enrollment.user_id,
        }
    }

    /// `(course_id, user_id)` of an enrollment between the anchor and
    /// `counterpart`.
    fn pair(&self, counterpart: u64) -> (u64, u64) {
        match self {
            Anchor::User(user_id) => (counterpart, *user_id),
            Anchor::Course(course_id) => (*course_id, counterpart),
        }
    }

    fn enrollments_path(&self) -> String {
        match self {
            Anchor::User(id) => format!("/users/{id}/enrollments"),
            Anchor::Course(id) => format!("/courses/{id}/enrollments"),
        }
    }
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anchor::User(id) => write!(f, "user {id}"),
            Anchor::Course(id) => write!(f, "course {id}"),
        }
    }
}

/// An enrollment in one of the managed membership sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub id: u64,
    pub user_id: u64,
    pub course_id: u64,
    pub state: EnrollmentState,
    pub role: MembershipRole,
}

/// Enrollments of one anchor, split by membership set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredEnrollments {
    pub anchor: Anchor,
    pub students: Vec<Enrollment>,
    pub teachers: Vec<Enrollment>,
}

impl AnchoredEnrollments {
    /// No enrollments for `anchor`.
    pub fn empty(anchor: Anchor) -> Self {
        Self {
            anchor,
            students: Vec::new(),
            teachers: Vec::new(),
        }
    }

    /// Enrollments of one membership set.
    pub fn of_role(&self, role: MembershipRole) -> &[Enrollment] {
        match role {
            MembershipRole::Student => &self.students,
            MembershipRole::Teacher => &self.teachers,
        }
    }

    /// Counterpart ids of the current (active or invited) enrollments, in
    /// first-seen order without duplicates.
    pub fn current_ids(&self, role: MembershipRole) -> Vec<String> {
        let mut ids: Vec<u64> = Vec::new();
        for enrollment in self.of_role(role) {
            let id = self.anchor.counterpart(enrollment);
            if enrollment.state.is_current() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids.into_iter().map(|id| id.to_string()).collect()
    }

    fn push(&mut self, enrollment: Enrollment) {
        match enrollment.role {
            MembershipRole::Student => self.students.push(enrollment),
            MembershipRole::Teacher => self.teachers.push(enrollment),
        }
    }
}

/// One mutating enrollment call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentAction {
    /// Create an active enrollment.
    Create {
        course_id: u64,
        user_id: u64,
        role: MembershipRole,
    },
    /// Deactivate an existing enrollment.
    Deactivate(Enrollment),
}

fn dedup(ids: &[u64]) -> Vec<u64> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}

/// Make the membership set equal `desired`.
///
/// Every existing enrollment that is not yet inactive and whose counterpart
/// is not desired gets deactivated. Every desired counterpart without an
/// `active` enrollment gets one created; an `invited` enrollment does not
/// count as present here.
pub fn plan_replace(
    anchor: Anchor,
    role: MembershipRole,
    existing: &[Enrollment],
    desired: &[u64],
) -> Vec<EnrollmentAction> {
    let desired = dedup(desired);

    let mut actions: Vec<EnrollmentAction> = existing
        .iter()
        .filter(|e| !e.state.is_inactive() && !desired.contains(&anchor.counterpart(e)))
        .cloned()
        .map(EnrollmentAction::Deactivate)
        .collect();

    let active: Vec<u64> = existing
        .iter()
        .filter(|e| e.state == EnrollmentState::Active)
        .map(|e| anchor.counterpart(e))
        .collect();

    actions.extend(
        desired
            .into_iter()
            .filter(|id| !active.contains(id))
            .map(|id| {
                let (course_id, user_id) = anchor.pair(id);
                EnrollmentAction::Create {
                    course_id,
                    user_id,
                    role,
                }
            }),
    );

    actions
}

/// Create an enrollment for every id, without consulting existing state.
pub fn plan_add(anchor: Anchor, role: MembershipRole, ids: &[u64]) -> Vec<EnrollmentAction> {
    dedup(ids)
        .into_iter()
        .map(|id| {
            let (course_id, user_id) = anchor.pair(id);
            EnrollmentAction::Create {
                course_id,
                user_id,
                role,
            }
        })
        .collect()
}

/// Deactivate every not-yet-inactive enrollment whose counterpart is listed.
pub fn plan_remove(anchor: Anchor, existing: &[Enrollment], ids: &[u64]) -> Vec<EnrollmentAction> {
    existing
        .iter()
        .filter(|e| !e.state.is_inactive() && ids.contains(&anchor.counterpart(e)))
        .cloned()
        .map(EnrollmentAction::Deactivate)
        .collect()
}

/// Membership edits for one anchor, grouped by delta partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChanges {
    pub replace: Vec<(MembershipRole, Vec<u64>)>,
    pub add: Vec<(MembershipRole, Vec<u64>)>,
    pub remove: Vec<(MembershipRole, Vec<u64>)>,
}

impl MembershipChanges {
    /// No membership edits at all.
    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.add.is_empty() && self.remove.is_empty()
    }

    /// Whether the current enrollments must be read first. Additions alone
    /// never need them.
    pub fn needs_existing(&self) -> bool {
        !self.replace.is_empty() || !self.remove.is_empty()
    }
}

/// Reads and mutates enrollments for the configured account.
#[derive(Debug, Clone, Copy)]
pub struct EnrollmentEngine<'a> {
    client: &'a CanvasClient,
    account_id: u64,
    roles: RoleIds,
    notify: bool,
}

impl<'a> EnrollmentEngine<'a> {
    /// Engine bound to `client` with the enrollment settings of `config`.
    pub fn new(client: &'a CanvasClient, config: &CanvasConfig) -> Self {
        Self {
            client,
            account_id: config.account_id,
            roles: RoleIds {
                student: config.student_role_id,
                teacher: config.teacher_role_id,
            },
            notify: config.send_enrollment_notification,
        }
    }

    /// Read the managed enrollments of `anchor`.
    ///
    /// Records of other root accounts and of unmanaged roles are dropped. A
    /// missing anchor yields [`ConnectorError::ObjectNotFound`].
    #[instrument(skip(self))]
    pub async fn fetch(&self, anchor: Anchor) -> ConnectorResult<AnchoredEnrollments> {
        let query = EnrollmentState::FETCHED
            .iter()
            .map(|state| ("state[]", state.as_str().to_string()))
            .collect();
        let mut pager = Pager::new(
            self.client,
            anchor.enrollments_path(),
            query,
            PageCursor::first(ENROLLMENT_PAGE_SIZE),
            ENROLLMENT_MAX_PAGES,
            "enrollments",
        );

        let identifier = anchor.id().to_string();
        let mut enrollments = AnchoredEnrollments::empty(anchor);
        while let Some(response) = pager.next_page().await? {
            let records: Vec<EnrollmentRecord> = response
                .not_found_as(&identifier)?
                .ensure_success()?
                .json()?;

            for record in records {
                if record.root_account_id != Some(self.account_id) {
                    trace!(enrollment_id = record.id, "Skipping enrollment of another account");
                    continue;
                }
                let Some(role) = self.roles.classify(record.role_id) else {
                    continue;
                };
                enrollments.push(Enrollment {
                    id: record.id,
                    user_id: record.user_id,
                    course_id: record.course_id,
                    state: record.enrollment_state,
                    role,
                });
            }
        }

        debug!(
            anchor = %anchor,
            students = enrollments.students.len(),
            teachers = enrollments.teachers.len(),
            "Fetched enrollments"
        );
        Ok(enrollments)
    }

    /// Apply `changes` to `anchor` in the order replace, add, remove.
    ///
    /// Existing enrollments are read once, and only when a replace or remove
    /// needs them. Returns the number of mutating calls issued.
    #[instrument(skip(self, changes))]
    pub async fn reconcile(
        &self,
        anchor: Anchor,
        changes: &MembershipChanges,
    ) -> ConnectorResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }

        let existing = if changes.needs_existing() {
            self.fetch(anchor).await?
        } else {
            AnchoredEnrollments::empty(anchor)
        };

        let mut actions = Vec::new();
        for (role, ids) in &changes.replace {
            actions.extend(plan_replace(anchor, *role, existing.of_role(*role), ids));
        }
        for (role, ids) in &changes.add {
            actions.extend(plan_add(anchor, *role, ids));
        }
        for (role, ids) in &changes.remove {
            actions.extend(plan_remove(anchor, existing.of_role(*role), ids));
        }

        self.apply(&actions).await?;

        info!(anchor = %anchor, calls = actions.len(), "Enrollments reconciled");
        Ok(actions.len())
    }

    /// Issue `actions` in order, stopping at the first failure.
    pub async fn apply(&self, actions: &[EnrollmentAction]) -> ConnectorResult<()> {
        for action in actions {
            match action {
                EnrollmentAction::Create {
                    course_id,
                    user_id,
                    role,
                } => self.create(*course_id, *user_id, *role).await?,
                EnrollmentAction::Deactivate(enrollment) => self.deactivate(enrollment).await?,
            }
        }
        Ok(())
    }

    async fn create(&self, course_id: u64, user_id: u64, role: MembershipRole) -> ConnectorResult<()> {
        let body = json!({
            "enrollment": {
                "user_id": user_id,
                "role_id": self.roles.role_id(role),
                "enrollment_state": EnrollmentState::Active.as_str(),
                "notify": self.notify,
            }
        });

        self.client
            .post(&format!("/courses/{course_id}/enrollments"), &body)
            .await?
            .ensure_success()?;

        debug!(course_id, user_id, role = %role, "Created enrollment");
        Ok(())
    }

    async fn deactivate(&self, enrollment: &Enrollment) -> ConnectorResult<()> {
        let path = format!(
            "/courses/{}/enrollments/{}",
            enrollment.course_id, enrollment.id
        );
        self.client
            .delete(&path, &[("task", DEACTIVATE_TASK.to_string())])
            .await?
            .ensure_success()?;

        debug!(
            enrollment_id = enrollment.id,
            course_id = enrollment.course_id,
            user_id = enrollment.user_id,
            "Deactivated enrollment"
        );
        Ok(())
    }
}

/// Parse counterpart ids supplied as attribute values.
pub fn parse_ids<'v>(
    attribute: &str,
    values: impl IntoIterator<Item = &'v xavyo_connector::operation::AttributeValue>,
) -> ConnectorResult<Vec<u64>> {
    values
        .into_iter()
        .map(|value| {
            value
                .to_text()
                .and_then(|text| text.trim().parse::<u64>().ok())
                .ok_or_else(|| {
                    ConnectorError::invalid_argument(format!(
                        "{attribute} must contain numeric ids, got {value:?}"
                    ))
                })
        })
        .collect()
}
