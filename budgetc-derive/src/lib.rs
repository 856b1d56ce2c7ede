use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Lit, LitStr, Meta, Token, Type,
};

/// Derive macro documenting the CSV columns of a record struct.
///
/// Each named field becomes one column:
/// - the column name honours `#[serde(rename = "...")]`
/// - the column is required unless the field is an `Option<T>`
/// - the description is taken from the field's doc comments
///
/// Generates `csv_schema() -> &'static [CsvField]` and `csv_header() -> String`.
/// `CsvField` must be in scope where the derive is used.
#[proc_macro_derive(CsvSchema, attributes(serde))]
pub fn derive_csv_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(name, "CsvSchema requires named fields")
                    .to_compile_error()
                    .into()
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "CsvSchema only supports structs")
                .to_compile_error()
                .into()
        }
    };

    let mut columns: Vec<(String, bool, String)> = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let column = match serde_rename(&field.attrs) {
            Ok(rename) => rename.unwrap_or_else(|| ident.to_string()),
            Err(err) => return err.to_compile_error().into(),
        };
        columns.push((column, !is_option(&field.ty), doc_comment(&field.attrs)));
    }

    let header = columns
        .iter()
        .map(|(column, _, _)| column.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let entries = columns.iter().map(|(column, required, description)| {
        quote! {
            CsvField {
                name: #column,
                required: #required,
                description: #description,
            }
        }
    });

    let expanded = quote! {
        impl #name {
            pub fn csv_schema() -> &'static [CsvField] {
                static SCHEMA: &[CsvField] = &[
                    #(#entries),*
                ];
                SCHEMA
            }

            pub fn csv_header() -> String {
                #header.to_string()
            }
        }
    };

    TokenStream::from(expanded)
}

/// The `rename = "..."` value of a field's `#[serde(...)]` attributes.
fn serde_rename(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
            } else if meta.input.peek(Token![=]) {
                let _: Expr = meta.value()?.parse()?;
            } else if meta.input.peek(syn::token::Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                let _: proc_macro2::TokenStream = content.parse()?;
            }
            Ok(())
        })?;
    }
    Ok(rename)
}

fn doc_comment(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(meta) => match &meta.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(s) => Some(s.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn field_attrs(input: DeriveInput) -> Vec<Attribute> {
        match input.data {
            Data::Struct(data) => data.fields.into_iter().next().unwrap().attrs,
            _ => panic!("expected a struct"),
        }
    }

    #[test]
    fn rename_is_read_among_other_options() {
        let input: DeriveInput = parse_quote! {
            struct Row {
                #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
                kind: Option<String>,
            }
        };
        let rename = serde_rename(&field_attrs(input)).unwrap();
        assert_eq!(rename.as_deref(), Some("type"));
    }

    #[test]
    fn directional_rename_is_skipped() {
        let input: DeriveInput = parse_quote! {
            struct Row {
                #[serde(rename(serialize = "out", deserialize = "in"))]
                kind: String,
            }
        };
        assert_eq!(serde_rename(&field_attrs(input)).unwrap(), None);
    }

    #[test]
    fn malformed_rename_is_an_error() {
        let input: DeriveInput = parse_quote! {
            struct Row {
                #[serde(rename = 5)]
                kind: String,
            }
        };
        assert!(serde_rename(&field_attrs(input)).is_err());
    }
}
