//! Canvas connector implementation
//!
//! Users and courses of one Canvas account, with membership sets kept in
//! sync through enrollments.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use xavyo_connector::config::ConnectorConfig;
use xavyo_connector::error::{ConnectorError, ConnectorResult};
use xavyo_connector::operation::{
    AttributeDelta, AttributeSet, Filter, PageRequest, SearchResult, Uid, NAME_ATTRIBUTE,
    UID_ATTRIBUTE,
};
use xavyo_connector::schema::Schema;
use xavyo_connector::traits::{Connector, CreateOp, DeleteOp, SchemaDiscovery, SearchOp, UpdateOp};

use crate::client::CanvasClient;
use crate::config::CanvasConfig;
use crate::enrollment::{Anchor, EnrollmentEngine};
use crate::mapper::{account_login, course_to_attributes, user_to_attributes};
use crate::model::{CourseRecord, LoginRecord, UserRecord};
use crate::pagination::{PageCursor, PageWindow, Pager, DEFAULT_PAGE_SIZE};
use crate::payload::{LoginPatch, ObjectChanges, UserDraft};
use crate::routing::CanvasObjectClass;
use crate::schema::build_schema;

/// Safety ceiling for the login scan behind name lookups and duplicate
/// resolution.
pub const LOGIN_SCAN_MAX_PAGES: u32 = 100;

/// Safety ceiling for unfiltered listing.
pub const LISTING_MAX_PAGES: u32 = 1000;

/// Body fragment of the 400 Canvas answers when a login is taken.
const DUPLICATE_LOGIN_MARKER: &str = "ID already in use for this account";

/// What a search filter asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    All,
    ById(String),
    ByLogin(String),
}

impl Lookup {
    fn from_filter(class: CanvasObjectClass, filter: Option<&Filter>) -> ConnectorResult<Self> {
        let Some(filter) = filter else {
            return Ok(Lookup::All);
        };

        if let Filter::Equals { attribute, value } = filter {
            match (class, attribute.as_str()) {
                (_, UID_ATTRIBUTE | "id") => return Ok(Lookup::ById(value.clone())),
                (CanvasObjectClass::User, NAME_ATTRIBUTE | "login_id") => {
                    return Ok(Lookup::ByLogin(value.clone()))
                }
                _ => {}
            }
        }

        Err(ConnectorError::UnsupportedFilter {
            message: format!("{filter:?} on {class}; only equality on the id or login name is supported"),
        })
    }
}

/// Keep only the requested attributes; the id and name always stay.
fn project(mut attrs: AttributeSet, attributes_to_get: Option<&[String]>) -> AttributeSet {
    let Some(wanted) = attributes_to_get else {
        return attrs;
    };
    let dropped: Vec<String> = attrs
        .names()
        .filter(|name| {
            *name != UID_ATTRIBUTE
                && *name != NAME_ATTRIBUTE
                && !wanted.iter().any(|w| w.as_str() == *name)
        })
        .map(str::to_string)
        .collect();
    for name in dropped {
        attrs.remove(&name);
    }
    attrs
}

fn parse_uid(uid: &Uid) -> ConnectorResult<u64> {
    uid.value().trim().parse().map_err(|_| {
        ConnectorError::invalid_argument(format!("'{}' is not a Canvas id", uid.value()))
    })
}

/// Canvas LMS connector.
pub struct CanvasConnector {
    config: CanvasConfig,
    client: CanvasClient,
    display_name: String,
    disposed: Arc<RwLock<bool>>,
}

impl std::fmt::Debug for CanvasConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasConnector")
            .field("config", &self.config.redacted())
            .field("display_name", &self.display_name)
            .finish()
    }
}

impl CanvasConnector {
    /// Create a connector from a configuration, validating it first.
    pub fn new(config: CanvasConfig) -> ConnectorResult<Self> {
        config.validate()?;

        let display_name = format!("Canvas: {} (account {})", config.base_url, config.account_id);
        let client = CanvasClient::new(&config)?;

        info!(config = ?config.redacted(), "Canvas connector created");

        Ok(Self {
            config,
            client,
            display_name,
            disposed: Arc::new(RwLock::new(false)),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    async fn check_disposed(&self) -> ConnectorResult<()> {
        if *self.disposed.read().await {
            return Err(ConnectorError::InvalidConfiguration {
                message: "Connector has been disposed".to_string(),
            });
        }
        Ok(())
    }

    fn enrollments(&self) -> EnrollmentEngine<'_> {
        EnrollmentEngine::new(&self.client, &self.config)
    }

    fn account_users_path(&self) -> String {
        format!("/accounts/{}/users", self.config.account_id)
    }

    /// Managed login of a user, if the user has one in the account.
    async fn fetch_login(&self, user_id: u64) -> ConnectorResult<Option<LoginRecord>> {
        let logins: Vec<LoginRecord> = self
            .client
            .get(&format!("/users/{user_id}/logins"), &[])
            .await?
            .not_found_as(&user_id.to_string())?
            .ensure_success()?
            .json()?;
        Ok(account_login(&logins, self.config.account_id).cloned())
    }

    /// Complete a user record with its enrollments and login.
    ///
    /// Records without a login name belong to deleted users and yield `None`.
    async fn read_user(&self, user: UserRecord) -> ConnectorResult<Option<AttributeSet>> {
        let Some(login_id) = user.login_id.clone() else {
            debug!(user_id = user.id, "User has no login, treating as deleted");
            return Ok(None);
        };
        let enrollments = self.enrollments().fetch(Anchor::User(user.id)).await?;
        let login = self.fetch_login(user.id).await?;
        Ok(Some(user_to_attributes(
            &user,
            &login_id,
            login.as_ref(),
            &enrollments,
        )))
    }

    async fn read_course(&self, course: CourseRecord) -> ConnectorResult<AttributeSet> {
        let enrollments = self.enrollments().fetch(Anchor::Course(course.id)).await?;
        Ok(course_to_attributes(&course, &enrollments))
    }

    async fn get_by_id(&self, class: CanvasObjectClass, id: &str) -> ConnectorResult<AttributeSet> {
        let Ok(numeric) = id.trim().parse::<u64>() else {
            return Err(ConnectorError::not_found(id));
        };

        match class {
            CanvasObjectClass::User => {
                let user: UserRecord = self
                    .client
                    .get(&format!("/users/{numeric}"), &[])
                    .await?
                    .not_found_as(id)?
                    .ensure_success()?
                    .json()?;
                self.read_user(user)
                    .await?
                    .ok_or_else(|| ConnectorError::not_found(id))
            }
            CanvasObjectClass::Course => {
                let course: CourseRecord = self
                    .client
                    .get(&format!("/courses/{numeric}"), &[])
                    .await?
                    .not_found_as(id)?
                    .ensure_success()?
                    .json()?;
                self.read_course(course).await
            }
        }
    }

    /// Scan the account users for an exact login name.
    ///
    /// Canvas cannot search by login name on the server side.
    async fn find_user_by_login(&self, login: &str) -> ConnectorResult<Option<UserRecord>> {
        let mut pager = Pager::new(
            &self.client,
            self.account_users_path(),
            vec![("include[]", "email".to_string())],
            PageCursor::first(DEFAULT_PAGE_SIZE),
            LOGIN_SCAN_MAX_PAGES,
            "account users",
        );

        while let Some(response) = pager.next_page().await? {
            let users: Vec<UserRecord> = response.ensure_success()?.json()?;
            if let Some(user) = users
                .into_iter()
                .find(|user| user.login_id.as_deref() == Some(login))
            {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    /// Read the window of a collection. The flag tells whether more items
    /// follow it.
    async fn read_window<T: DeserializeOwned>(
        &self,
        pager: &mut Pager<'_>,
        window: &PageWindow,
    ) -> ConnectorResult<(Vec<T>, bool)> {
        let full = |records: &Vec<T>| window.limit.is_some_and(|limit| records.len() >= limit);
        let mut skip = window.skip;
        let mut records = Vec::new();

        while let Some(response) = pager.next_page().await? {
            let page: Vec<T> = response.ensure_success()?.json()?;
            let skipped = skip.min(page.len());
            skip -= skipped;

            for item in page.into_iter().skip(skipped) {
                if full(&records) {
                    return Ok((records, true));
                }
                records.push(item);
            }
            if full(&records) {
                return Ok((records, pager.has_next()));
            }
        }
        Ok((records, false))
    }

    async fn list(
        &self,
        class: CanvasObjectClass,
        page_request: Option<&PageRequest>,
    ) -> ConnectorResult<SearchResult> {
        let window = PageWindow::from_request(page_request);
        let account_id = self.config.account_id;

        let (objects, read, has_more) = match class {
            CanvasObjectClass::User => {
                let mut pager = Pager::new(
                    &self.client,
                    self.account_users_path(),
                    vec![("include[]", "email".to_string())],
                    window.start.clone(),
                    LISTING_MAX_PAGES,
                    "account users",
                );
                let (users, has_more) = self.read_window::<UserRecord>(&mut pager, &window).await?;
                let read = users.len();
                let mut objects = Vec::with_capacity(read);
                for user in users {
                    if let Some(attrs) = self.read_user(user).await? {
                        objects.push(attrs);
                    }
                }
                (objects, read, has_more)
            }
            CanvasObjectClass::Course => {
                let mut pager = Pager::new(
                    &self.client,
                    format!("/accounts/{account_id}/courses"),
                    Vec::new(),
                    window.start.clone(),
                    LISTING_MAX_PAGES,
                    "account courses",
                );
                let (courses, has_more) =
                    self.read_window::<CourseRecord>(&mut pager, &window).await?;
                let read = courses.len();
                let mut objects = Vec::with_capacity(read);
                for course in courses {
                    objects.push(self.read_course(course).await?);
                }
                (objects, read, has_more)
            }
        };

        debug!(object_class = %class, read, returned = objects.len(), has_more, "Listed objects");

        let result = SearchResult::new(objects);
        if has_more {
            let read = u32::try_from(read).unwrap_or(u32::MAX);
            Ok(result.with_next_offset(window.offset.saturating_add(read)))
        } else {
            Ok(result)
        }
    }

    /// Apply login changes, the password last and on its own.
    async fn update_login(&self, user_id: u64, patch: &LoginPatch) -> ConnectorResult<()> {
        let login = self.fetch_login(user_id).await?.ok_or_else(|| {
            ConnectorError::operation_failed(format!(
                "No login info found for user {user_id} on account {}",
                self.config.account_id
            ))
        })?;
        let path = format!("/accounts/{}/logins/{}", self.config.account_id, login.id);

        if patch.has_non_password_changes() {
            let response = self.client.put(&path, &patch.body()).await?;
            if response.status == StatusCode::NOT_FOUND {
                let hint = if patch.authentication_provider_id.is_some() {
                    "possibly invalid authentication provider id"
                } else {
                    "login update rejected"
                };
                return Err(ConnectorError::operation_failed(format!(
                    "{hint}: {}",
                    response.error()
                )));
            }
            response.ensure_success()?;
            info!(user_id, login_id = login.id, "Login updated");
        }

        if let Some(body) = patch.password_body() {
            let response = self.client.put(&path, &body).await?;
            if !response.is_success() {
                warn!(user_id, status = %response.status, "Password change rejected");
                return Err(ConnectorError::PasswordChangeRejected {
                    message: response.error().to_string(),
                });
            }
            info!(user_id, login_id = login.id, "Password changed");
        }

        Ok(())
    }

    async fn create_user(&self, attributes: &AttributeSet) -> ConnectorResult<Uid> {
        let draft = UserDraft::from_attributes(attributes)?;

        let response = self
            .client
            .post(&self.account_users_path(), &draft.body())
            .await?;

        if response.status == StatusCode::BAD_REQUEST && response.body.contains(DUPLICATE_LOGIN_MARKER) {
            warn!(login = %draft.login, "Login already in use, resolving existing user");
            let existing = self.find_user_by_login(&draft.login).await?;
            return Err(ConnectorError::ObjectAlreadyExists {
                identifier: draft.login,
                uid: existing.map(|user| user.id.to_string()),
            });
        }

        let created: UserRecord = response.ensure_success()?.json()?;
        info!(user_id = created.id, login = %draft.login, "User created");

        if draft.enabled == Some(false) {
            let disable = LoginPatch {
                enabled: Some(false),
                ..LoginPatch::default()
            };
            self.update_login(created.id, &disable).await?;
        }

        self.enrollments()
            .reconcile(Anchor::User(created.id), &draft.memberships())
            .await?;

        Ok(Uid::from_value(created.id.to_string()))
    }
}

#[async_trait]
impl Connector for CanvasConnector {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    #[instrument(skip(self))]
    async fn test_connection(&self) -> ConnectorResult<()> {
        self.check_disposed().await?;

        let response = match self.client.get("/users/self", &[]).await {
            Err(ConnectorError::NetworkError { message, .. }) => {
                return Err(ConnectorError::connection_failed(message));
            }
            other => other?,
        };
        match response.status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ConnectorError::AuthenticationFailed)
            }
            _ => {
                let owner: UserRecord = response.ensure_success()?.json()?;
                info!(token_owner = owner.id, "Canvas connection test succeeded");
                Ok(())
            }
        }
    }

    async fn dispose(&self) -> ConnectorResult<()> {
        *self.disposed.write().await = true;
        info!("Canvas connector disposed");
        Ok(())
    }
}

#[async_trait]
impl SchemaDiscovery for CanvasConnector {
    #[instrument(skip(self))]
    async fn discover_schema(&self) -> ConnectorResult<Schema> {
        self.check_disposed().await?;
        Ok(build_schema(self.config.course_ids_on_users))
    }
}

#[async_trait]
impl CreateOp for CanvasConnector {
    #[instrument(skip(self, attributes))]
    async fn create(&self, object_class: &str, attributes: AttributeSet) -> ConnectorResult<Uid> {
        self.check_disposed().await?;

        match CanvasObjectClass::parse(object_class)? {
            CanvasObjectClass::User => self.create_user(&attributes).await,
            CanvasObjectClass::Course => Err(ConnectorError::unsupported("create", object_class)),
        }
    }
}

#[async_trait]
impl UpdateOp for CanvasConnector {
    #[instrument(skip(self, changes))]
    async fn update(
        &self,
        object_class: &str,
        uid: &Uid,
        changes: AttributeDelta,
    ) -> ConnectorResult<Uid> {
        self.check_disposed().await?;

        let class = CanvasObjectClass::parse(object_class)?;
        let id = parse_uid(uid)?;
        let changes = ObjectChanges::from_delta(class, &changes)?;

        let anchor = match class {
            CanvasObjectClass::User => Anchor::User(id),
            CanvasObjectClass::Course => Anchor::Course(id),
        };
        self.enrollments()
            .reconcile(anchor, &changes.memberships)
            .await?;

        if class == CanvasObjectClass::User {
            if !changes.profile.is_empty() {
                let body = serde_json::json!({ "user": &changes.profile });
                self.client
                    .put(&format!("/users/{id}"), &body)
                    .await?
                    .not_found_as(uid.value())?
                    .ensure_success()?;
                info!(user_id = id, fields = changes.profile.len(), "User profile updated");
            }
            if !changes.login.is_empty() {
                self.update_login(id, &changes.login).await?;
            }
        }

        Ok(Uid::from_value(id.to_string()))
    }
}

#[async_trait]
impl DeleteOp for CanvasConnector {
    #[instrument(skip(self))]
    async fn delete(&self, object_class: &str, uid: &Uid) -> ConnectorResult<()> {
        self.check_disposed().await?;

        match CanvasObjectClass::parse(object_class)? {
            CanvasObjectClass::User => {
                let id = parse_uid(uid)?;
                self.client
                    .delete(&format!("{}/{id}", self.account_users_path()), &[])
                    .await?
                    .not_found_as(uid.value())?
                    .ensure_success()?;
                info!(user_id = id, "User removed from account");
                Ok(())
            }
            CanvasObjectClass::Course => Err(ConnectorError::unsupported("delete", object_class)),
        }
    }
}

#[async_trait]
impl SearchOp for CanvasConnector {
    #[instrument(skip(self))]
    async fn search(
        &self,
        object_class: &str,
        filter: Option<Filter>,
        attributes_to_get: Option<Vec<String>>,
        page_request: Option<PageRequest>,
    ) -> ConnectorResult<SearchResult> {
        self.check_disposed().await?;

        let class = CanvasObjectClass::parse(object_class)?;
        let result = match Lookup::from_filter(class, filter.as_ref())? {
            Lookup::ById(id) => SearchResult::new(vec![self.get_by_id(class, &id).await?]),
            Lookup::ByLogin(login) => match self.find_user_by_login(&login).await? {
                Some(user) => SearchResult::new(self.read_user(user).await?.into_iter().collect()),
                None => SearchResult::empty(),
            },
            Lookup::All => self.list(class, page_request.as_ref()).await?,
        };

        let wanted = attributes_to_get.as_deref();
        Ok(SearchResult {
            objects: result
                .objects
                .into_iter()
                .map(|attrs| project(attrs, wanted))
                .collect(),
            ..result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CanvasConfig {
        CanvasConfig::new("https://school.instructure.com", "token", 1, 3, 4)
    }

    #[test]
    fn test_connector_creation() {
        let connector = CanvasConnector::new(config()).unwrap();
        assert!(connector.display_name().contains("school.instructure.com"));
        assert!(connector.display_name().contains("account 1"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = CanvasConnector::new(CanvasConfig::new("", "token", 1, 3, 4));
        assert!(matches!(
            result,
            Err(ConnectorError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_debug_hides_token() {
        let connector =
            CanvasConnector::new(CanvasConfig::new("https://school.instructure.com", "s3cret", 1, 3, 4))
                .unwrap();
        assert!(!format!("{connector:?}").contains("s3cret"));
    }

    #[test]
    fn test_lookup_from_filter() {
        let user = CanvasObjectClass::User;
        let course = CanvasObjectClass::Course;

        assert_eq!(Lookup::from_filter(user, None).unwrap(), Lookup::All);
        assert_eq!(
            Lookup::from_filter(user, Some(&Filter::eq(UID_ATTRIBUTE, "5"))).unwrap(),
            Lookup::ById("5".to_string())
        );
        assert_eq!(
            Lookup::from_filter(course, Some(&Filter::eq("id", "7"))).unwrap(),
            Lookup::ById("7".to_string())
        );
        assert_eq!(
            Lookup::from_filter(user, Some(&Filter::eq("login_id", "ada"))).unwrap(),
            Lookup::ByLogin("ada".to_string())
        );
    }

    #[test]
    fn test_unsupported_filters() {
        let by_course_name = Filter::eq(NAME_ATTRIBUTE, "Algebra");
        assert!(matches!(
            Lookup::from_filter(CanvasObjectClass::Course, Some(&by_course_name)),
            Err(ConnectorError::UnsupportedFilter { .. })
        ));

        let partial = Filter::contains(NAME_ATTRIBUTE, "ad");
        assert!(matches!(
            Lookup::from_filter(CanvasObjectClass::User, Some(&partial)),
            Err(ConnectorError::UnsupportedFilter { .. })
        ));
    }

    #[test]
    fn test_projection_keeps_identity() {
        let attrs = AttributeSet::new()
            .with(UID_ATTRIBUTE, "1")
            .with(NAME_ATTRIBUTE, "ada")
            .with("email", "ada@example.edu")
            .with("short_name", "Ada");

        let wanted = vec!["email".to_string()];
        let projected = project(attrs.clone(), Some(wanted.as_slice()));
        assert!(projected.has(UID_ATTRIBUTE));
        assert!(projected.has(NAME_ATTRIBUTE));
        assert!(projected.has("email"));
        assert!(!projected.has("short_name"));

        assert_eq!(project(attrs.clone(), None), attrs);
    }

    #[test]
    fn test_parse_uid() {
        assert_eq!(parse_uid(&Uid::from_value("42")).unwrap(), 42);
        assert!(matches!(
            parse_uid(&Uid::from_value("abc")),
            Err(ConnectorError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_disposed_connector_rejects_calls() {
        let connector = CanvasConnector::new(config()).unwrap();
        connector.dispose().await.unwrap();

        let err = connector.discover_schema().await.unwrap_err();
        assert!(err.to_string().contains("disposed"));
        let err = connector
            .search("user", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidConfiguration { .. }));
    }
}
