//! Routes served by the `switchyard` binary.

use switchyard::http::{HandlerRef, MiddlewareRef, Reply, RequestContext};
use switchyard::routing::{GroupAttributes, RouteError, Routes};

fn log_request(ctx: &RequestContext<'_>) -> bool {
    tracing::info!(method = %ctx.method(), path = %ctx.path(), "Request");
    true
}

fn require_admin(ctx: &RequestContext<'_>) -> bool {
    ctx.session()
        .get("is_admin")
        .map_or(false, |value| !value.is_empty())
}

pub fn register(routes: &mut Routes) -> Result<(), RouteError> {
    routes.add_global_middleware(MiddlewareRef::func(log_request));

    routes.group(
        GroupAttributes::new()
            .prefix("admin")
            .middleware(MiddlewareRef::func(require_admin)),
        |r| {
            r.get("/dashboard", HandlerRef::func(|_| Ok(Reply::text("Admin Dashboard"))))?;

            r.get(
                "/users/{id?}",
                HandlerRef::func(|ctx| {
                    Ok(Reply::text(match ctx.param("id") {
                        Some(id) => format!("Admin viewing user {}", id),
                        None => "Admin user list".to_string(),
                    }))
                }),
            )?;

            // Prefixes stack: /admin/api/users
            r.group(GroupAttributes::new().prefix("api"), |r| {
                r.get(
                    "/users",
                    HandlerRef::func(|_| Ok(Reply::text("API: List users (admin only)"))),
                )?;
                Ok(())
            })?;
            Ok(())
        },
    )?;

    routes.get(
        "/",
        HandlerRef::func(|ctx| {
            let body = match ctx.session().take_flash("notice") {
                Some(notice) => format!("Homepage\n{}", notice),
                None => "Homepage".to_string(),
            };
            Ok(Reply::text(body))
        }),
    )?;

    routes.get(
        "/profile/{username?}",
        HandlerRef::func(|ctx| {
            Ok(Reply::text(match ctx.param("username") {
                Some(name) => format!("Profile: {}", name),
                None => "My profile".to_string(),
            }))
        }),
    )?;

    routes.post(
        "/login",
        HandlerRef::func(|ctx| {
            ctx.session().set_flash("notice", "Logged in!");
            Ok(Reply::text("Logged in!"))
        }),
    )?;

    routes.get("about-us/{username?}", "views/about")?;

    routes.group(GroupAttributes::new().prefix("/chat"), |r| {
        r.get("/user", HandlerRef::func(|_| Ok(Reply::text("User chat"))))?;
        Ok(())
    })?;

    Ok(())
}
