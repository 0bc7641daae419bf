use super::*;

/// Derive `Tagged` for a type.
pub fn expand(item: &syn::DeriveInput) -> Result<proc_macro2::TokenStream> {
    if !item.generics.params.is_empty() {
        bail!(item.generics, "generic types cannot be tagged, use a wrapper tag instead");
    }

    let attrs: Vec<_> = item.attrs.iter().filter(|attr| attr.path().is_ident("tagged")).collect();
    let attr = match attrs.as_slice() {
        [attr] => attr,
        [] => bail!(item.ident, "missing `#[tagged(zone = .., id = ..)]` attribute"),
        [_, second, ..] => bail!(second, "duplicate `tagged` attribute"),
    };

    let meta = parse_attr(attr)?;
    let Some(zone) = meta.zone else {
        bail!(attr, "missing `zone` in `tagged` attribute");
    };
    let Some(id) = meta.id else {
        bail!(attr, "missing `id` in `tagged` attribute");
    };

    let ident = &item.ident;
    let name = meta.name.unwrap_or_else(|| ident.to_string());

    Ok(quote! {
        impl ::reqeval::Tagged for #ident {
            const TAG: ::reqeval::TypeTag = ::reqeval::TypeTag::new(#zone, #id);

            fn type_name() -> ::std::borrow::Cow<'static, str> {
                ::std::borrow::Cow::Borrowed(#name)
            }
        }
    })
}

/// The arguments of a `tagged` attribute.
#[derive(Default)]
struct Meta {
    zone: Option<syn::Expr>,
    id: Option<u8>,
    name: Option<String>,
}

/// Parse `zone = .., id = .., name = ".."` in any order.
fn parse_attr(attr: &syn::Attribute) -> Result<Meta> {
    let mut meta = Meta::default();
    attr.parse_nested_meta(|nested| {
        let Some(key) = nested.path.get_ident() else {
            bail!(nested.path, "expected `zone`, `id` or `name`");
        };

        match key.to_string().as_str() {
            "zone" if meta.zone.is_none() => {
                meta.zone = Some(nested.value()?.parse()?);
            }
            "id" if meta.id.is_none() => {
                let lit: syn::LitInt = nested.value()?.parse()?;
                match lit.base10_parse::<u8>() {
                    Ok(id) => meta.id = Some(id),
                    Err(_) => bail!(lit, "local ids must fit into a `u8`"),
                }
            }
            "name" if meta.name.is_none() => {
                let lit: syn::LitStr = nested.value()?.parse()?;
                meta.name = Some(lit.value());
            }
            "zone" | "id" | "name" => bail!(key, "duplicate `{}` in `tagged` attribute", key),
            _ => bail!(key, "unknown key `{}`, expected `zone`, `id` or `name`", key),
        }

        Ok(())
    })?;
    Ok(meta)
}
