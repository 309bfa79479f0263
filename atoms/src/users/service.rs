use super::model::{
    AdminAllowList, ProfileView, RegistrationDetails, Role, UpdateUserPayload, UserProfile,
};
use crate::error::{AtomError, AtomResult};
use crate::store::ProfileStore;

fn view(profile: UserProfile, allow_list: &AdminAllowList) -> ProfileView {
    let effective_role = Role::resolve(Some(&profile.user_role), &profile.user_email, allow_list);
    ProfileView {
        profile,
        effective_role,
    }
}

/// Load the signed-in user's profile, creating it on first sign-in.
///
/// The allow-list is evaluated here, once per resolution: an allow-listed
/// email is `admin` regardless of the stored role.
pub async fn resolve_profile<S>(
    store: &S,
    user_id: &str,
    email: &str,
    allow_list: &AdminAllowList,
) -> AtomResult<ProfileView>
where
    S: ProfileStore + ?Sized,
{
    if let Some(profile) = store.get_profile(user_id).await? {
        return Ok(view(profile, allow_list));
    }

    let role = if allow_list.contains(email) { Role::Admin } else { Role::User };
    let fresh = UserProfile::first_sign_in(user_id, email, role);
    if store.create_profile(&fresh).await? {
        tracing::info!(user_id, role = %role, "👤 profile created on first sign-in");
        return Ok(view(fresh, allow_list));
    }

    // Lost a race with a concurrent first sign-in; read what won.
    let profile = store
        .get_profile(user_id)
        .await?
        .ok_or_else(|| AtomError::NotFound(format!("User {}", user_id)))?;
    Ok(view(profile, allow_list))
}

/// Profile written at sign-up with the submitted student details.
pub async fn register_profile<S>(
    store: &S,
    user_id: &str,
    email: &str,
    details: RegistrationDetails,
) -> AtomResult<UserProfile>
where
    S: ProfileStore + ?Sized,
{
    let user_name = details.user_name.trim();
    let profile = UserProfile {
        user_id: user_id.to_string(),
        user_name: if user_name.is_empty() {
            super::model::default_name(email)
        } else {
            user_name.to_string()
        },
        user_email: email.to_string(),
        user_role: Role::User.as_str().to_string(),
        student_id: details.student_id,
        level: details.level,
        department: details.department,
        borrows: Vec::new(),
        user_created_at: chrono::Utc::now().to_rfc3339(),
    };

    if !store.create_profile(&profile).await? {
        return Err(AtomError::Conflict(format!("profile for {} already exists", email)));
    }
    tracing::info!(user_id, "👤 profile registered");
    Ok(profile)
}

pub async fn get_user<S>(store: &S, user_id: &str, allow_list: &AdminAllowList) -> AtomResult<ProfileView>
where
    S: ProfileStore + ?Sized,
{
    store
        .get_profile(user_id)
        .await?
        .map(|p| view(p, allow_list))
        .ok_or_else(|| AtomError::NotFound(format!("User {}", user_id)))
}

pub async fn update_user<S>(
    store: &S,
    user_id: &str,
    payload: UpdateUserPayload,
    allow_list: &AdminAllowList,
) -> AtomResult<ProfileView>
where
    S: ProfileStore + ?Sized,
{
    if matches!(&payload.user_name, Some(name) if name.trim().is_empty()) {
        return Err(AtomError::validation("user_name must not be empty"));
    }
    if !payload.is_empty() {
        store.update_profile(user_id, &payload).await?;
    }
    get_user(store, user_id, allow_list).await
}

/// Admin role edit. The value must be a known role; it is stored as given.
pub async fn set_user_role<S>(
    store: &S,
    user_id: &str,
    role: &str,
    allow_list: &AdminAllowList,
) -> AtomResult<ProfileView>
where
    S: ProfileStore + ?Sized,
{
    let parsed = Role::parse(role)
        .ok_or_else(|| AtomError::validation(format!("Unknown role '{}'", role)))?;
    store.set_role(user_id, role.trim()).await?;
    tracing::info!(user_id, role = %parsed, "🔑 role updated");
    get_user(store, user_id, allow_list).await
}

pub async fn list_users<S>(store: &S, allow_list: &AdminAllowList) -> AtomResult<Vec<ProfileView>>
where
    S: ProfileStore + ?Sized,
{
    Ok(store
        .list_profiles()
        .await?
        .into_iter()
        .map(|p| view(p, allow_list))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn first_resolution_creates_profile_once() {
        let store = MemoryStore::new();
        let allow = AdminAllowList::default();
        let first = resolve_profile(&store, "u1", "nok@college.ac.th", &allow).await.unwrap();
        assert_eq!(first.effective_role, Role::User);
        assert_eq!(first.profile.user_name, "nok");

        store
            .update_profile(
                "u1",
                &UpdateUserPayload {
                    user_name: Some("Nok".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let second = resolve_profile(&store, "u1", "nok@college.ac.th", &allow).await.unwrap();
        assert_eq!(second.profile.user_name, "Nok");
        assert_eq!(store.list_profiles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn allow_listed_email_is_admin_even_with_stored_user_role() {
        let store = MemoryStore::new();
        register_profile(
            &store,
            "a1",
            "admin@gmail.com",
            RegistrationDetails {
                user_name: "Admin".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let allow = AdminAllowList::from_csv("admin@gmail.com");
        let resolved = resolve_profile(&store, "a1", "admin@gmail.com", &allow).await.unwrap();
        assert_eq!(resolved.profile.user_role, "user");
        assert_eq!(resolved.effective_role, Role::Admin);
    }

    #[tokio::test]
    async fn stored_role_is_read_case_insensitively() {
        let store = MemoryStore::new();
        let allow = AdminAllowList::default();
        resolve_profile(&store, "s1", "staff@college.ac.th", &allow).await.unwrap();
        let updated = set_user_role(&store, "s1", "Staff", &allow).await.unwrap();
        assert_eq!(updated.profile.user_role, "Staff");
        assert_eq!(updated.effective_role, Role::Staff);

        assert!(matches!(
            set_user_role(&store, "s1", "librarian", &allow).await,
            Err(AtomError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let store = MemoryStore::new();
        let details = RegistrationDetails {
            user_name: "Pim".into(),
            student_id: Some("6501".into()),
            level: Some("Diploma 2".into()),
            department: Some("Accounting".into()),
        };
        register_profile(&store, "p1", "pim@college.ac.th", details.clone()).await.unwrap();
        assert!(matches!(
            register_profile(&store, "p1", "pim@college.ac.th", details).await,
            Err(AtomError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn blank_name_update_is_rejected() {
        let store = MemoryStore::new();
        let allow = AdminAllowList::default();
        resolve_profile(&store, "u1", "u1@x.com", &allow).await.unwrap();
        let err = update_user(
            &store,
            "u1",
            UpdateUserPayload {
                user_name: Some("  ".into()),
                ..Default::default()
            },
            &allow,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AtomError::Validation(_)));
    }
}
