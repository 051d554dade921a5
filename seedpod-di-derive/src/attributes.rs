use syn::meta::ParseNestedMeta;
use syn::{Attribute, Error, Expr, ExprPath, LitStr, Result, Token};

pub const POD: &str = "pod";

pub enum DefaultDefinition {
    Default,
    Expr(ExprPath),
}

/// Configuration of a single injected field or factory parameter.
#[derive(Default)]
pub struct FieldAttributes {
    pub default: Option<DefaultDefinition>,
    pub name: Option<LitStr>,
    pub qualifiers: Vec<ExprPath>,
    pub fallback: Option<ExprPath>,
    pub ignore: bool,
}

impl FieldAttributes {
    /// Merges all `#[pod]` attributes in given list.
    pub fn from_attributes(attributes: &[Attribute]) -> Result<Self> {
        let mut result = Self::default();
        for attribute in attributes {
            if attribute.path().is_ident(POD) {
                attribute.parse_nested_meta(|meta| result.parse(meta))?;
            }
        }

        if result.default.is_some() && (result.name.is_some() || result.fallback.is_some()) {
            return Err(Error::new_spanned(
                &attributes[0],
                "Fields with default values are not injected!",
            ));
        }

        Ok(result)
    }

    fn parse(&mut self, meta: ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("default") {
            if meta.input.peek(Token![=]) {
                self.default = Some(DefaultDefinition::Expr(parse_path(&meta)?));
            } else {
                self.default = Some(DefaultDefinition::Default);
            }
        } else if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("qualifier") {
            self.qualifiers.push(parse_path(&meta)?);
        } else if meta.path.is_ident("fallback") {
            self.fallback = Some(parse_path(&meta)?);
        } else if meta.path.is_ident("ignore") {
            self.ignore = true;
        } else {
            return Err(meta.error("Unsupported pod field attribute!"));
        }

        Ok(())
    }

    /// Is the value resolved by the container?
    #[inline]
    pub fn is_injected(&self) -> bool {
        self.default.is_none() && !self.ignore
    }
}

/// Configuration of a pod, either from `#[pod(...)]` on a struct or from `#[pod_factory(...)]`.
#[derive(Default)]
pub struct PodAttributes {
    pub name: Option<LitStr>,
    pub scope: Option<LitStr>,
    pub is_primary: bool,
    pub is_lazy: bool,
    pub order: Option<Expr>,
    pub constructor: Option<ExprPath>,
}

impl PodAttributes {
    /// Merges all `#[pod]` attributes in given list.
    pub fn from_attributes(attributes: &[Attribute]) -> Result<Self> {
        let mut result = Self::default();
        for attribute in attributes {
            if attribute.path().is_ident(POD) {
                attribute.parse_nested_meta(|meta| result.parse(meta))?;
            }
        }

        Ok(result)
    }

    pub fn parse(&mut self, meta: ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("scope") {
            let scope: LitStr = meta.value()?.parse()?;
            if !matches!(
                scope.value().as_str(),
                "SINGLETON" | "PROTOTYPE" | "CONTEXT"
            ) {
                return Err(Error::new(
                    scope.span(),
                    "Scope must be one of: SINGLETON, PROTOTYPE, CONTEXT!",
                ));
            }

            self.scope = Some(scope);
        } else if meta.path.is_ident("primary") {
            self.is_primary = true;
        } else if meta.path.is_ident("lazy") {
            self.is_lazy = true;
        } else if meta.path.is_ident("order") {
            self.order = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("constructor") {
            self.constructor = Some(parse_path(&meta)?);
        } else {
            return Err(meta.error("Unsupported pod attribute!"));
        }

        Ok(())
    }
}

fn parse_path(meta: &ParseNestedMeta) -> Result<ExprPath> {
    let value: LitStr = meta.value()?.parse()?;
    value.parse()
}
