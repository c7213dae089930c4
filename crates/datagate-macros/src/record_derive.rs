//! Implementation of the Record derive macro.
//!
//! This module parses `#[record(...)]` attributes and generates the field
//! table, the value accessor and the setter at compile time.

use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{Data, DeriveInput, Error, Field, Fields, Ident, LitStr, Result, Type};

/// Parsed definition of a struct with `#[derive(Record)]`.
#[derive(Debug)]
pub struct RecordDef {
    /// The struct name.
    pub name: Ident,
    /// Default relation.
    pub table: String,
    /// Tagged fields in declaration order.
    pub fields: Vec<RecordFieldDef>,
    /// Generics from the struct.
    pub generics: syn::Generics,
}

/// Parsed tags of a single field.
#[derive(Debug)]
pub struct RecordFieldDef {
    /// The field name.
    pub name: Ident,
    /// The field type.
    pub ty: Type,
    /// Read column (may be the `"-"` sentinel).
    pub select: Option<String>,
    /// Write column (may be the `"-"` sentinel).
    pub write: Option<String>,
    /// Validation rule expression.
    pub validate: Option<String>,
    /// Validation code suffix.
    pub user_code: Option<String>,
}

/// Rules whose parameter must be numeric.
const NUMERIC_RULES: &[&str] = &["min", "max", "len", "gt", "gte", "lt", "lte"];

/// Parse a `DeriveInput` into a `RecordDef`.
pub fn parse_record(input: &DeriveInput) -> Result<RecordDef> {
    let name = input.ident.clone();
    let generics = input.generics.clone();

    let mut table = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                check_identifier(&lit)?;
                table = Some(lit.value());
                Ok(())
            } else {
                let attr_name = meta.path.to_token_stream().to_string();
                Err(meta.error(format!(
                    "unknown record attribute `{attr_name}`. Valid struct attributes are: table"
                )))
            }
        })?;
    }

    let fields = match &input.data {
        Data::Struct(data) => parse_record_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Record can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Record can only be derived for structs, not unions",
            ));
        }
    };

    Ok(RecordDef {
        table: table.unwrap_or_else(|| to_snake_case(&name.to_string())),
        name,
        fields,
        generics,
    })
}

/// Parse all fields, keeping only the tagged ones.
fn parse_record_fields(fields: &Fields) -> Result<Vec<RecordFieldDef>> {
    match fields {
        Fields::Named(named) => {
            let mut out = Vec::new();
            for field in &named.named {
                if let Some(def) = parse_record_field(field)? {
                    out.push(def);
                }
            }
            Ok(out)
        }
        Fields::Unnamed(_) => Err(Error::new_spanned(
            fields,
            "Record requires a struct with named fields",
        )),
        Fields::Unit => Ok(Vec::new()),
    }
}

/// Parse a single field. Returns `None` when it carries no `#[record]` tag.
fn parse_record_field(field: &Field) -> Result<Option<RecordFieldDef>> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
    let default_column = name.to_string();

    let mut tagged = false;
    let mut select = None;
    let mut write = None;
    let mut validate = None;
    let mut user_code = None;

    for attr in &field.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        tagged = true;

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("select") {
                select = Some(column_value(&meta, &default_column)?);
            } else if path.is_ident("write") || path.is_ident("insert") {
                if write.is_some() {
                    return Err(meta.error("write column given more than once"));
                }
                write = Some(column_value(&meta, &default_column)?);
            } else if path.is_ident("validate") {
                let lit: LitStr = meta.value()?.parse()?;
                check_rules(&lit)?;
                validate = Some(lit.value());
            } else if path.is_ident("user_code") {
                let lit: LitStr = meta.value()?.parse()?;
                user_code = Some(lit.value());
            } else {
                let attr_name = path.to_token_stream().to_string();
                return Err(meta.error(format!(
                    "unknown record attribute `{attr_name}`. \
                     Valid attributes are: select, write, insert, validate, user_code"
                )));
            }

            Ok(())
        })?;
    }

    if !tagged {
        return Ok(None);
    }

    Ok(Some(RecordFieldDef {
        name,
        ty: field.ty.clone(),
        select,
        write,
        validate,
        user_code,
    }))
}

/// Read `select` / `select = "col"`, defaulting to the field name.
fn column_value(meta: &syn::meta::ParseNestedMeta<'_>, default: &str) -> Result<String> {
    if !meta.input.peek(syn::Token![=]) {
        return Ok(default.to_string());
    }
    let lit: LitStr = meta.value()?.parse()?;
    let value = lit.value();
    if value.trim().is_empty() || value.trim() == "-" {
        return Ok(value);
    }
    check_identifier(&lit)?;
    Ok(value)
}

/// Reject column and table names that are not plain (optionally qualified)
/// identifiers. They are interpolated into SQL text.
fn check_identifier(lit: &LitStr) -> Result<()> {
    let pattern = regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .map_err(|e| Error::new_spanned(lit, format!("internal pattern error: {e}")))?;
    if pattern.is_match(lit.value().trim()) {
        Ok(())
    } else {
        Err(Error::new_spanned(
            lit,
            format!("`{}` is not a valid SQL identifier", lit.value()),
        ))
    }
}

/// Check rule syntax: non-empty tags, numeric parameters where required.
fn check_rules(lit: &LitStr) -> Result<()> {
    let expr = lit.value();
    for segment in expr.split(',').map(str::trim) {
        if segment.is_empty() {
            continue;
        }
        let (tag, param) = match segment.split_once('=') {
            Some((tag, param)) => (tag.trim(), Some(param.trim())),
            None => (segment, None),
        };
        if tag.is_empty() {
            return Err(Error::new_spanned(
                lit,
                format!("validation rule `{segment}` has no tag"),
            ));
        }
        if NUMERIC_RULES.contains(&tag) {
            match param {
                Some(p) if p.parse::<f64>().is_ok() => {}
                _ => {
                    return Err(Error::new_spanned(
                        lit,
                        format!("validation rule `{tag}` needs a numeric parameter"),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn opt_call(method: &str, value: Option<&String>) -> TokenStream {
    match value {
        Some(v) => {
            let method = Ident::new(method, proc_macro2::Span::call_site());
            quote! { .#method(#v) }
        }
        None => quote! {},
    }
}

/// Generate the `Record` and `FromRow` implementations.
pub fn generate_record_impl(def: &RecordDef) -> TokenStream {
    let name = &def.name;
    let table = &def.table;
    let (impl_generics, ty_generics, where_clause) = def.generics.split_for_impl();
    let count = def.fields.len();

    let specs: Vec<TokenStream> = def
        .fields
        .iter()
        .map(|f| {
            let field_name = f.name.to_string();
            let select = opt_call("select", f.select.as_ref());
            let write = opt_call("write", f.write.as_ref());
            let validate = opt_call("validate", f.validate.as_ref());
            let user_code = opt_call("user_code", f.user_code.as_ref());
            quote! {
                ::datagate_core::FieldSpec::new(#field_name) #select #write #validate #user_code
            }
        })
        .collect();

    let getters: Vec<TokenStream> = def
        .fields
        .iter()
        .map(|f| {
            let ident = &f.name;
            let field_name = ident.to_string();
            quote! {
                #field_name => ::core::option::Option::Some(
                    ::datagate_core::Value::from(::core::clone::Clone::clone(&self.#ident))
                ),
            }
        })
        .collect();

    let setters: Vec<TokenStream> = def
        .fields
        .iter()
        .map(|f| {
            let ident = &f.name;
            let ty = &f.ty;
            let field_name = ident.to_string();
            quote! {
                #field_name => {
                    self.#ident = <#ty as ::datagate_core::FromValue>::from_value(value, field)?;
                    true
                }
            }
        })
        .collect();

    quote! {
        impl #impl_generics ::datagate_core::Record for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;

            fn fields() -> &'static [::datagate_core::FieldSpec] {
                static FIELDS: [::datagate_core::FieldSpec; #count] = [#(#specs),*];
                &FIELDS
            }

            fn field_value(&self, field: &str) -> ::core::option::Option<::datagate_core::Value> {
                match field {
                    #(#getters)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn set_field(
                &mut self,
                field: &str,
                value: &::datagate_core::Value,
            ) -> ::datagate_core::Result<bool> {
                let known = match field {
                    #(#setters)*
                    _ => false,
                };
                ::core::result::Result::Ok(known)
            }
        }

        impl #impl_generics ::datagate_core::FromRow for #name #ty_generics #where_clause {
            fn from_row(row: &::datagate_core::Row) -> ::datagate_core::Result<Self> {
                ::datagate_core::bind_lax(row)
            }
        }
    }
}
