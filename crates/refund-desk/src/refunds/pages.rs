use tera::{Context, Tera};

use super::console::ListingRow;
use super::handler::FormPage;

pub const SUCCESS_FLASH: &str = "Your refund request has been submitted successfully!";

/// Tera environment with the refund templates compiled in.
pub struct PageRenderer {
    tera: Tera,
}

impl PageRenderer {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base.html", include_str!("../../templates/base.html")),
            ("index.html", include_str!("../../templates/index.html")),
            ("success.html", include_str!("../../templates/success.html")),
            ("admin_list.html", include_str!("../../templates/admin_list.html")),
        ])?;
        Ok(Self { tera })
    }

    pub fn form(&self, page: &FormPage) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("form", page);
        self.tera.render("index.html", &context)
    }

    pub fn success(&self) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("message", SUCCESS_FLASH);
        self.tera.render("success.html", &context)
    }

    pub fn listing(&self, rows: &[ListingRow]) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("rows", rows);
        self.tera.render("admin_list.html", &context)
    }
}
