use proc_macro::TokenStream as TokenStream1;
use quote::ToTokens;
use syn::{self, ReturnType, Type};

/// This macro is added before a method of `BlackjackGame` in the impl block.
/// Use this macro to first check if current game phase is exactly the phase in
/// the attribute.
///
/// For example, `#[allowed_phase(PlayerActing)]` will make a method first check
/// if current game phase is `PlayerActing`. If not, the method returns early:
/// - `false` when the method returns `bool` (the action was not applied),
/// - `Err(Error::NotReady { .. })` when the method returns a `Result`.
#[proc_macro_attribute]
pub fn allowed_phase(attr: TokenStream1, item: TokenStream1) -> TokenStream1 {
    let mut ast: syn::ImplItemFn = syn::parse(item).unwrap();
    let phase = attr.to_string();
    let function_name = ast.sig.ident.to_string();

    let early_return = match rejection_kind(&ast.sig.output) {
        Rejection::Bool => String::from("return false;"),
        Rejection::NotReady => format!(
            r#"return Err(crate::Error::NotReady {{ operation: "{}", phase: self.phase }});"#,
            function_name
        ),
    };
    let code = format!(
        r#"
    if self.phase != GamePhase::{} {{
        {}
    }}
"#,
        phase, early_return
    );
    let early_return: TokenStream1 = code.parse().unwrap();
    let early_return: syn::Stmt = syn::parse(early_return).unwrap();
    ast.block.stmts.insert(0, early_return);
    ast.into_token_stream().into()
}

enum Rejection {
    Bool,
    NotReady,
}

fn rejection_kind(output: &ReturnType) -> Rejection {
    match output {
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Path(type_path) if type_path.path.is_ident("bool") => Rejection::Bool,
            _ => Rejection::NotReady,
        },
        ReturnType::Default => Rejection::NotReady,
    }
}
