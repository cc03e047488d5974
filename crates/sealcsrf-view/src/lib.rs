//! # sealcsrf view
//!
//! Helpers for embedding the CSRF token in server-rendered HTML forms.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sealcsrf_view::{insert_csrf, register_functions};
//!
//! let mut tera = Tera::new("templates/**/*.html")?;
//! register_functions(&mut tera);
//!
//! async fn signup(req: Request<Body>) -> Response<Body> {
//!     let mut context = tera::Context::new();
//!     if let Some(csrf) = CsrfContext::from_extensions(req.extensions()) {
//!         insert_csrf(&mut context, csrf);
//!     }
//!     // templates/signup.html:
//!     //   <form method="post">{{ csrf_field | safe }} ... </form>
//!     //   or: {{ csrf_input(token=csrf_token) | safe }}
//!     render(&tera, "signup.html", &context)
//! }
//! ```

use http::Request;
use sealcsrf_core::{CsrfContext, DEFAULT_FIELD_NAME};
use std::collections::HashMap;
use tera::{Tera, Value};

/// Context key holding the rendered hidden input.
pub const TEMPLATE_TAG: &str = "csrf_field";

/// Context key holding the bare masked token.
pub const TOKEN_KEY: &str = "csrf_token";

/// Name of the tera function registered by [`register_functions`].
pub const INPUT_FUNCTION: &str = "csrf_input";

/// Render the hidden form input carrying the masked token.
pub fn csrf_field(ctx: &CsrfContext) -> String {
    hidden_input(ctx.field_name(), ctx.token())
}

/// The hidden form input for the current request.
///
/// Empty when the request did not pass through the CSRF layer.
pub fn template_field<B>(req: &Request<B>) -> String {
    CsrfContext::from_extensions(req.extensions())
        .map(csrf_field)
        .unwrap_or_default()
}

/// Insert [`TEMPLATE_TAG`] and [`TOKEN_KEY`] into a tera context.
pub fn insert_csrf(context: &mut tera::Context, ctx: &CsrfContext) {
    context.insert(TEMPLATE_TAG, &csrf_field(ctx));
    context.insert(TOKEN_KEY, ctx.token());
}

/// Register the `csrf_input(token=..., field=...)` function.
///
/// `field` defaults to `csrf_token`.
pub fn register_functions(tera: &mut Tera) {
    tera.register_function(INPUT_FUNCTION, csrf_input);
}

fn csrf_input(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let token = match args.get("token") {
        Some(value) => tera::from_value::<String>(value.clone())?,
        None => return Err(tera::Error::msg("csrf_input requires a `token` argument")),
    };
    let field = match args.get("field") {
        Some(value) => tera::from_value::<String>(value.clone())?,
        None => DEFAULT_FIELD_NAME.to_string(),
    };

    Ok(Value::String(hidden_input(&field, &token)))
}

fn hidden_input(name: &str, value: &str) -> String {
    format!(
        r#"<input type="hidden" name="{}" value="{}">"#,
        tera::escape_html(name),
        tera::escape_html(value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn context(field: &str) -> CsrfContext {
        CsrfContext::new(
            "abc-DEF_123".to_string(),
            Arc::from(field),
            Arc::from("X-CSRF-Token"),
            None,
        )
    }

    #[test]
    fn test_csrf_field() {
        assert_eq!(
            csrf_field(&context("csrf_token")),
            r#"<input type="hidden" name="csrf_token" value="abc-DEF_123">"#
        );
    }

    #[test]
    fn test_field_name_is_escaped() {
        let html = csrf_field(&context(r#"x"><script>"#));
        assert!(!html.contains("<script>"));
        assert!(html.contains("x&quot;&gt;&lt;script&gt;"));

        let html = csrf_field(&context("a'b&c"));
        assert!(html.contains(r#"name="a&#x27;b&amp;c""#));
    }

    #[test]
    fn test_template_field() {
        let mut req = Request::get("/").body(()).unwrap();
        assert_eq!(template_field(&req), "");

        req.extensions_mut().insert(context("authenticity_token"));
        assert!(template_field(&req).contains(r#"name="authenticity_token""#));
    }

    #[test]
    fn test_render_with_context() {
        let mut tera = Tera::default();
        tera.add_raw_template(
            "form.html",
            r#"<form method="post">{{ csrf_field | safe }}<i>{{ csrf_token }}</i></form>"#,
        )
        .unwrap();

        let mut ctx = tera::Context::new();
        insert_csrf(&mut ctx, &context("csrf_token"));
        let html = tera.render("form.html", &ctx).unwrap();

        assert_eq!(
            html,
            r#"<form method="post"><input type="hidden" name="csrf_token" value="abc-DEF_123"><i>abc-DEF_123</i></form>"#
        );
    }

    #[test]
    fn test_csrf_input_function() {
        let mut tera = Tera::default();
        register_functions(&mut tera);
        tera.add_raw_template(
            "a.html",
            r#"{{ csrf_input(token=csrf_token) | safe }}|{{ csrf_input(token=csrf_token, field="_token") | safe }}"#,
        )
        .unwrap();

        let mut ctx = tera::Context::new();
        ctx.insert(TOKEN_KEY, "t0k");
        let html = tera.render("a.html", &ctx).unwrap();

        assert_eq!(
            html,
            r#"<input type="hidden" name="csrf_token" value="t0k">|<input type="hidden" name="_token" value="t0k">"#
        );
    }

    #[test]
    fn test_csrf_input_requires_token() {
        let mut tera = Tera::default();
        register_functions(&mut tera);
        tera.add_raw_template("b.html", "{{ csrf_input() | safe }}")
            .unwrap();

        assert!(tera.render("b.html", &tera::Context::new()).is_err());
    }
}
