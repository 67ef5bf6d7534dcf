//! Client route guards (post-hydration re-validation).
//!
//! - `RouteGuard::protected`: only authenticated users see the content (login redirect otherwise)
//! - `RouteGuard::guest_only`: only unauthenticated users see the content (home redirect otherwise)
//!
//! Both use the same `decide` rule set as the edge middleware. They never evaluate an
//! un-hydrated store: the view stays `Loading` until hydration completes or the
//! hydration timeout elapses (then the store is treated as logged out).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::client::store::AuthSnapshot;
use crate::services::gate::redirect::return_url_from_query;
use crate::services::gate::session::{AuthFailure, evaluate_client};
use crate::services::gate::{
    Action, AuthDecision, RedirectBuilder, RoleRequirement, RouteCategory, decide,
};

pub const DEFAULT_HYDRATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Imperative navigation (router push/replace on the client).
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: &str);
}

impl<T: Navigator + ?Sized> Navigator for Arc<T> {
    fn navigate(&self, destination: &str) {
        (**self).navigate(destination)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardView {
    Loading,
    Content,
    Redirecting(String),
}

impl GuardView {
    /// Render children, the loading indicator, or nothing while navigating away.
    pub fn render<T>(&self, content: impl FnOnce() -> T, loading: impl FnOnce() -> T) -> Option<T> {
        match self {
            GuardView::Content => Some(content()),
            GuardView::Loading => Some(loading()),
            GuardView::Redirecting(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Option<String>,
}

impl Location {
    pub fn new(path: impl Into<String>, query: Option<&str>) -> Self {
        Self {
            path: path.into(),
            query: query.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardKind {
    Protected,
    GuestOnly,
}

type AuthCheckHook = Box<dyn Fn(bool) + Send + Sync>;
type RedirectHook = Box<dyn Fn(&str) + Send + Sync>;

pub struct RouteGuard<N> {
    kind: GuardKind,
    redirects: RedirectBuilder,
    requirement: Option<RoleRequirement>,
    navigator: N,
    on_auth_check: Option<AuthCheckHook>,
    on_redirect: Option<RedirectHook>,
    hydration_timeout: Duration,
}

impl<N: Navigator> RouteGuard<N> {
    pub fn protected(redirects: RedirectBuilder, navigator: N) -> Self {
        Self::new(GuardKind::Protected, redirects, navigator)
    }

    pub fn guest_only(redirects: RedirectBuilder, navigator: N) -> Self {
        Self::new(GuardKind::GuestOnly, redirects, navigator)
    }

    fn new(kind: GuardKind, redirects: RedirectBuilder, navigator: N) -> Self {
        Self {
            kind,
            redirects,
            requirement: None,
            navigator,
            on_auth_check: None,
            on_redirect: None,
            hydration_timeout: DEFAULT_HYDRATION_TIMEOUT,
        }
    }

    /// Protected guard only: additionally demand roles (forbidden redirect otherwise).
    pub fn require_role(mut self, requirement: RoleRequirement) -> Self {
        if self.kind == GuardKind::Protected {
            self.requirement = Some(requirement);
        }
        self
    }

    pub fn on_auth_check(mut self, hook: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_auth_check = Some(Box::new(hook));
        self
    }

    pub fn on_redirect(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_redirect = Some(Box::new(hook));
        self
    }

    pub fn hydration_timeout(mut self, timeout: Duration) -> Self {
        self.hydration_timeout = timeout;
        self
    }

    fn category(&self) -> RouteCategory {
        match (self.kind, &self.requirement) {
            (GuardKind::Protected, None) => RouteCategory::Protected,
            (GuardKind::Protected, Some(_)) => RouteCategory::Admin,
            (GuardKind::GuestOnly, _) => RouteCategory::Auth,
        }
    }

    /// One check against one snapshot. Hooks fire at most once each; nothing fires while loading.
    pub fn check(&self, snapshot: &AuthSnapshot, location: &Location, now: DateTime<Utc>) -> GuardView {
        if !snapshot.has_hydrated {
            return GuardView::Loading;
        }
        self.resolve(&evaluate_client(snapshot, now), location)
    }

    fn resolve(&self, auth: &AuthDecision, location: &Location) -> GuardView {
        if let Some(hook) = &self.on_auth_check {
            hook(auth.has_valid_session());
        }

        let requirement = self
            .requirement
            .clone()
            .unwrap_or_else(RoleRequirement::admin);

        let redirect = match decide(self.category(), auth, &requirement) {
            Action::PassThrough => return GuardView::Content,
            Action::RedirectToLogin => self
                .redirects
                .to_login(&location.path, location.query.as_deref()),
            Action::RedirectToHome => {
                let candidate = return_url_from_query(location.query.as_deref());
                self.redirects.to_home(candidate.as_deref())
            }
            Action::RedirectToForbidden => self.redirects.to_forbidden(),
        };

        let destination = redirect.location();
        if let Some(hook) = &self.on_redirect {
            hook(destination);
        }
        self.navigator.navigate(destination);
        GuardView::Redirecting(destination.to_string())
    }

    /// Follow the store until the guard navigates away or the store is dropped.
    ///
    /// Re-evaluates only when the store publishes a change.
    pub async fn run(
        &self,
        mut store: watch::Receiver<AuthSnapshot>,
        location: Location,
        views: watch::Sender<GuardView>,
    ) {
        views.send_replace(GuardView::Loading);

        // Drop the watch guard right away; holding it would block the store writer.
        let hydrated = tokio::time::timeout(self.hydration_timeout, store.wait_for(|s| s.has_hydrated))
            .await
            .map(|r| r.map(|_| ()));

        match hydrated {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return,
            Err(_) => {
                tracing::warn!(
                    path = %location.path,
                    timeout_ms = self.hydration_timeout.as_millis() as u64,
                    "auth store hydration timed out; treating as signed out"
                );
                let view = self.resolve(&AuthDecision::anonymous(AuthFailure::MissingToken), &location);
                let done = matches!(view, GuardView::Redirecting(_));
                views.send_replace(view);
                if done || store.changed().await.is_err() {
                    return;
                }
            }
        }

        loop {
            // Clone out of the watch lock before running hooks/navigation.
            let snapshot = store.borrow_and_update().clone();
            if snapshot.has_hydrated {
                let view = self.check(&snapshot, &location, Utc::now());
                let done = matches!(view, GuardView::Redirecting(_));
                views.send_replace(view);
                if done {
                    return;
                }
            }
            if store.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::store::{AuthStore, UserIdentity};
    use crate::services::gate::Role;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingNavigator {
        visited: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        fn visited(&self) -> Vec<String> {
            self.visited.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, destination: &str) {
            self.visited.lock().unwrap().push(destination.to_string());
        }
    }

    fn redirects() -> RedirectBuilder {
        RedirectBuilder::new("/login", "/", "/403")
    }

    fn signed_in(role: &str) -> AuthSnapshot {
        AuthSnapshot {
            is_authenticated: true,
            token: Some("tok".into()),
            expires_at: Some(Utc::now() + ChronoDuration::hours(1)),
            user: Some(UserIdentity {
                id: "u-1".into(),
                role: Some(role.into()),
                ..Default::default()
            }),
            auth_user: None,
            has_hydrated: true,
        }
    }

    fn signed_out() -> AuthSnapshot {
        AuthSnapshot {
            has_hydrated: true,
            ..Default::default()
        }
    }

    #[test]
    fn unhydrated_store_renders_loading_without_side_effects() {
        let nav = Arc::new(RecordingNavigator::default());
        let checks = Arc::new(AtomicUsize::new(0));
        let c = checks.clone();
        let guard = RouteGuard::protected(redirects(), nav.clone())
            .on_auth_check(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            });

        let view = guard.check(&AuthSnapshot::default(), &Location::new("/dashboard", None), Utc::now());
        assert_eq!(view, GuardView::Loading);
        assert_eq!(checks.load(Ordering::SeqCst), 0);
        assert!(nav.visited().is_empty());
    }

    #[test]
    fn protected_guard_redirects_signed_out_users() {
        let nav = Arc::new(RecordingNavigator::default());
        let redirected = Arc::new(Mutex::new(Vec::new()));
        let checks = Arc::new(Mutex::new(Vec::new()));
        let (r, c) = (redirected.clone(), checks.clone());
        let guard = RouteGuard::protected(redirects(), nav.clone())
            .on_auth_check(move |ok| c.lock().unwrap().push(ok))
            .on_redirect(move |to| r.lock().unwrap().push(to.to_string()));

        let view = guard.check(&signed_out(), &Location::new("/dashboard", Some("w=1")), Utc::now());
        let expected = "/login?returnUrl=%2Fdashboard%3Fw%3D1".to_string();
        assert_eq!(view, GuardView::Redirecting(expected.clone()));
        assert_eq!(*checks.lock().unwrap(), vec![false]);
        assert_eq!(*redirected.lock().unwrap(), vec![expected.clone()]);
        assert_eq!(nav.visited(), vec![expected]);
    }

    #[test]
    fn protected_guard_renders_for_signed_in_users() {
        let nav = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::protected(redirects(), nav.clone());
        let view = guard.check(&signed_in("USER"), &Location::new("/dashboard", None), Utc::now());
        assert_eq!(view, GuardView::Content);
        assert!(nav.visited().is_empty());
        assert_eq!(view.render(|| "children", || "spinner"), Some("children"));
    }

    #[test]
    fn flag_without_identity_is_not_trusted() {
        let nav = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::protected(redirects(), nav.clone());
        let mut snap = signed_in("USER");
        snap.user = None;
        let view = guard.check(&snap, &Location::new("/profile", None), Utc::now());
        assert!(matches!(view, GuardView::Redirecting(_)));
    }

    #[test]
    fn role_restricted_guard_forbids_plain_users() {
        let nav = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::protected(redirects(), nav.clone())
            .require_role(RoleRequirement::any([Role::Admin]));
        let loc = Location::new("/admin", None);

        assert_eq!(
            guard.check(&signed_in("USER"), &loc, Utc::now()),
            GuardView::Redirecting("/403".into())
        );
        assert_eq!(guard.check(&signed_in("ADMIN"), &loc, Utc::now()), GuardView::Content);
    }

    #[test]
    fn guest_guard_sends_signed_in_users_home() {
        let nav = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::guest_only(redirects(), nav.clone());

        let view = guard.check(
            &signed_in("USER"),
            &Location::new("/login", Some("returnUrl=%2Frecipes%2F9")),
            Utc::now(),
        );
        assert_eq!(view, GuardView::Redirecting("/recipes/9".into()));

        let view = guard.check(
            &signed_in("USER"),
            &Location::new("/login", Some("returnUrl=%2F%2Fevil.example")),
            Utc::now(),
        );
        assert_eq!(view, GuardView::Redirecting("/".into()));

        let view = guard.check(&signed_out(), &Location::new("/login", None), Utc::now());
        assert_eq!(view, GuardView::Content);
        assert_eq!(view.render(|| 1, || 0), Some(1));
        assert_eq!(GuardView::Redirecting("/".into()).render(|| 1, || 0), None);
    }

    #[tokio::test]
    async fn run_waits_for_hydration_then_checks_once() {
        let store = AuthStore::new();
        let nav = Arc::new(RecordingNavigator::default());
        let checks = Arc::new(AtomicUsize::new(0));
        let c = checks.clone();
        let guard = Arc::new(
            RouteGuard::protected(redirects(), nav.clone()).on_auth_check(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let (views_tx, mut views) = watch::channel(GuardView::Loading);
        let rx = store.subscribe();
        let g = guard.clone();
        let task = tokio::spawn(async move {
            g.run(rx, Location::new("/dashboard", None), views_tx).await;
        });

        tokio::task::yield_now().await;
        assert_eq!(*views.borrow(), GuardView::Loading);
        assert_eq!(checks.load(Ordering::SeqCst), 0);

        store.hydrate(signed_in("USER"));
        views.wait_for(|v| *v == GuardView::Content).await.unwrap();
        assert_eq!(checks.load(Ordering::SeqCst), 1);

        // Signing out is a change: the guard re-checks and navigates away.
        store.logout();
        views
            .wait_for(|v| matches!(v, GuardView::Redirecting(_)))
            .await
            .unwrap();
        task.await.unwrap();
        assert_eq!(checks.load(Ordering::SeqCst), 2);
        assert_eq!(nav.visited(), vec!["/login?returnUrl=%2Fdashboard".to_string()]);
    }

    #[tokio::test]
    async fn run_fails_closed_after_hydration_timeout() {
        let store = AuthStore::new();
        let nav = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::protected(redirects(), nav.clone())
            .hydration_timeout(Duration::from_millis(20));

        let (views_tx, views) = watch::channel(GuardView::Loading);
        guard
            .run(store.subscribe(), Location::new("/settings", None), views_tx)
            .await;

        assert_eq!(
            *views.borrow(),
            GuardView::Redirecting("/login?returnUrl=%2Fsettings".into())
        );
        assert_eq!(nav.visited().len(), 1);
    }
}
