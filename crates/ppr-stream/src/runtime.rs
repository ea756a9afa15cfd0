//! Client runtime protocol.
//!
//! The head carries a small script that installs `window.__PPR__`, a
//! page-scoped registry of pending and resolved boundary ids. It is created
//! on first use and removed on `pagehide`. Streamed chunks then call:
//!
//! - `register(ids)` once, after the shell
//! - `inject(id, html, replace)` per resolved boundary (fires `ppr:resolved`,
//!   then `ppr:complete` when nothing is pending)
//! - `error(id, message)` per failed boundary (fires `ppr:error`)

/// Markup shown in place of a boundary that failed to resolve.
pub const ERROR_FRAGMENT: &str =
    r#"<div class="ppr-error" role="alert">This section failed to load.</div>"#;

/// Client runtime installed in the document head.
pub const RUNTIME_SCRIPT: &str = r#"(function(){
if(window.__PPR__)return;
var ATTR="data-ppr-id";
var ppr={resolved:new Set(),pending:new Set(),
find:function(id){return document.querySelector("["+ATTR+"=\""+CSS.escape(id)+"\"]");},
emit:function(name,detail){document.dispatchEvent(new CustomEvent(name,{detail:detail}));},
settle:function(id){ppr.pending.delete(id);ppr.resolved.add(id);if(ppr.pending.size===0)ppr.emit("ppr:complete",{resolved:Array.from(ppr.resolved)});},
register:function(ids){ids.forEach(function(id){if(!ppr.resolved.has(id))ppr.pending.add(id);});},
inject:function(id,html,replace){var el=ppr.find(id);if(el){if(replace){el.outerHTML=html;}else{el.innerHTML=html;}}ppr.emit("ppr:resolved",{id:id});ppr.settle(id);},
error:function(id,message){var el=ppr.find(id);if(el){el.innerHTML='<div class="ppr-error" role="alert">This section failed to load.</div>';}ppr.emit("ppr:error",{id:id,message:message});ppr.settle(id);}
};
window.__PPR__=ppr;
window.addEventListener("pagehide",function(){delete window.__PPR__;},{once:true});
})();"#;

/// Encode a value as a JavaScript string literal safe inside `<script>`.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
        .replace("<!--", "<\\!--")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Script registering the boundaries still pending after the shell.
pub fn register_script<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let ids: Vec<String> = ids.into_iter().map(js_string).collect();
    format!("<script>window.__PPR__.register([{}])</script>", ids.join(","))
}

/// Script injecting resolved markup into a boundary's element.
pub fn inject_script(id: &str, html: &str) -> String {
    format!(
        "<script>window.__PPR__.inject({},{},false)</script>",
        js_string(id),
        js_string(html)
    )
}

/// Script replacing a boundary with the error indicator.
pub fn error_script(id: &str, message: &str) -> String {
    format!(
        "<script>window.__PPR__.error({},{})</script>",
        js_string(id),
        js_string(message)
    )
}
