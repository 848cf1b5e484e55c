//! The shipped attack pattern data
//!
//! Patterns match against the canonical form of the serialized message (see
//! [`crate::canonical`]), so encoded variants of these tokens are already
//! collapsed by the time matching runs. Rounds are declared most specific /
//! most dangerous first; within a round, earlier patterns win.
//!
//! CRLF patterns carry both real control characters (produced when the
//! canonicalizer decodes `%0d%0a`) and their JSON-escaped spellings, because
//! serialization writes literal `\r\n` for control characters that arrived
//! unencoded.

use crate::pipeline::result::{Severity, ViolationType};

use super::{AttackPattern, RoundSpec};

const PATH_TRAVERSAL: &[AttackPattern] = &[
    AttackPattern::new("dot-dot-slash", r"\.\./|\.\.\\", Severity::Critical),
    AttackPattern::new(
        "sensitive-etc-file",
        r"/etc/(?:passwd|shadow|sudoers|hosts)\b",
        Severity::Critical,
    ),
    AttackPattern::new(
        "windows-system-path",
        r"(?:[a-z]:\\|\\\\)[^\s\x22]{0,120}\\(?:system32|windows)\b",
        Severity::High,
    ),
    AttackPattern::new(
        "ssh-key-path",
        r"\.ssh[/\\](?:id_rsa|id_ed25519|id_ecdsa|authorized_keys)\b",
        Severity::High,
    ),
    AttackPattern::new("proc-self", r"/proc/self/", Severity::High),
    AttackPattern::new(
        "windows-ini-sam",
        r"\\(?:win\.ini|boot\.ini|sam)\b",
        Severity::High,
    ),
];

const SSRF: &[AttackPattern] = &[
    AttackPattern::new("cloud-metadata-ip", r"169\.254\.169\.254", Severity::Critical),
    AttackPattern::new(
        "gcp-metadata-host",
        r"metadata\.google\.internal",
        Severity::Critical,
    ),
    AttackPattern::new("aws-imds-path", r"/latest/meta-data/", Severity::Critical),
    AttackPattern::new(
        "loopback-url",
        r"(?:https?|ftp|gopher|dict)://(?:localhost|127\.0\.0\.1|0\.0\.0\.0|\[::1\])",
        Severity::High,
    ),
    AttackPattern::new(
        "private-range-10",
        r"https?://10\.\d{1,3}\.\d{1,3}\.\d{1,3}",
        Severity::High,
    ),
    AttackPattern::new(
        "private-range-192",
        r"https?://192\.168\.\d{1,3}\.\d{1,3}",
        Severity::High,
    ),
    AttackPattern::new(
        "private-range-172",
        r"https?://172\.(?:1[6-9]|2\d|3[01])\.\d{1,3}\.\d{1,3}",
        Severity::High,
    ),
    AttackPattern::new(
        "exotic-scheme",
        r"\b(?:gopher|dict|tftp|jar|netdoc)://",
        Severity::High,
    ),
    AttackPattern::new(
        "decimal-encoded-ip",
        r#"https?://\d{8,10}(?:[/:\x22]|$)"#,
        Severity::Medium,
    ),
];

const COMMAND: &[AttackPattern] = &[
    AttackPattern::new(
        "chained-download-exec",
        r"(?:curl|wget)[^;|&\x22]{0,120}\|\s*(?:bash|sh|zsh)\b",
        Severity::Critical,
    ),
    AttackPattern::new("rm-rf-root", r"\brm\s+-[a-z]*rf?[a-z]*\s+/", Severity::Critical),
    AttackPattern::new("dev-tcp-socket", r"/dev/(?:tcp|udp)/", Severity::Critical),
    AttackPattern::new(
        "pipe-to-shell",
        r"\|\s*(?:bash|sh|zsh|powershell)\b",
        Severity::Critical,
    ),
    AttackPattern::new(
        "shell-metachar-chain",
        r"[;&|]\s*(?:cat|ls|id|whoami|rm|curl|wget|nc|ncat|bash|sh|cmd|powershell)\b",
        Severity::Critical,
    ),
    AttackPattern::new("command-substitution", r"\$\([^)]{0,200}\)", Severity::High),
    AttackPattern::new("backtick-substitution", r"`[^`]{1,200}`", Severity::Medium),
];

const LOLBINS: &[AttackPattern] = &[
    AttackPattern::new(
        "powershell-encoded",
        r"powershell[^\x22]{0,120}-(?:e|enc|encodedcommand)\b",
        Severity::Critical,
    ),
    AttackPattern::new(
        "certutil-download",
        r"certutil[^\x22]{0,80}-urlcache",
        Severity::High,
    ),
    AttackPattern::new("mshta-exec", r"\bmshta(?:\.exe)?\b", Severity::High),
    AttackPattern::new(
        "rundll32-exec",
        r"\brundll32(?:\.exe)?\b",
        Severity::High,
    ),
    AttackPattern::new(
        "bitsadmin-transfer",
        r"\bbitsadmin\b[^\x22]{0,80}/transfer",
        Severity::High,
    ),
    AttackPattern::new(
        "regsvr32-scrobj",
        r"regsvr32[^\x22]{0,80}scrobj",
        Severity::High,
    ),
];

const SQL: &[AttackPattern] = &[
    AttackPattern::new(
        "union-select",
        r"union(?:\s|\+|all|distinct|/\*.{0,20}\*/)+select",
        Severity::Critical,
    ),
    AttackPattern::new(
        "stacked-query",
        r";\s*(?:drop|delete|insert|update|truncate|alter)\b",
        Severity::Critical,
    ),
    AttackPattern::new(
        "file-read-write",
        r"\b(?:load_file|into\s+(?:out|dump)file)\b",
        Severity::Critical,
    ),
    AttackPattern::new(
        "or-equals-tautology",
        r#"(?:'|\x22)\s*or\s+(?:'|\x22)?\d(?:'|\x22)?\s*=\s*(?:'|\x22)?\d"#,
        Severity::High,
    ),
    AttackPattern::new(
        "time-based-probe",
        r"\b(?:sleep|benchmark|pg_sleep|waitfor\s+delay)\s*\(",
        Severity::High,
    ),
    AttackPattern::new("quote-comment", r"'\s*(?:--|#)", Severity::High),
    AttackPattern::new(
        "information-schema",
        r"information_schema\.",
        Severity::Medium,
    ),
];

const NOSQL: &[AttackPattern] = &[
    AttackPattern::new("mongo-where-operator", r#"\x22\$where\x22\s*:"#, Severity::Critical),
    AttackPattern::new(
        "mongo-function-operator",
        r#"\x22\$(?:function|accumulator)\x22\s*:"#,
        Severity::Critical,
    ),
    AttackPattern::new(
        "mongo-comparison-operator",
        r#"\x22\$(?:ne|gt|gte|lt|lte|in|nin|exists)\x22\s*:"#,
        Severity::High,
    ),
    AttackPattern::new("mongo-regex-operator", r#"\x22\$regex\x22\s*:"#, Severity::Medium),
    AttackPattern::new(
        "mongo-shell-call",
        r"\bdb\.[a-z][a-zA-Z]{0,30}\.(?:find|remove|drop|update)\s*\(",
        Severity::Medium,
    ),
];

const DESERIALIZATION: &[AttackPattern] = &[
    AttackPattern::cased("java-serialized-magic", r"rO0AB", Severity::Critical),
    AttackPattern::cased(
        "dotnet-binaryformatter-magic",
        r"AAEAAAD/////",
        Severity::Critical,
    ),
    AttackPattern::new(
        "java-gadget-library",
        r"\b(?:org\.apache\.commons\.collections|ysoserial)\b",
        Severity::Critical,
    ),
    AttackPattern::new(
        "yaml-python-tag",
        r"!!python/(?:object|module|name)",
        Severity::Critical,
    ),
    AttackPattern::new("pickle-reduce", r"c__builtin__|\bpickle\.loads\b", Severity::Critical),
    AttackPattern::new(
        "php-serialized-object",
        r#"O:\d+:\x22[^\x22]{1,80}\x22:\d+:\{"#,
        Severity::Critical,
    ),
];

const PROTOTYPE_POLLUTION: &[AttackPattern] = &[
    AttackPattern::new("proto-key", r#"\x22__proto__\x22\s*:"#, Severity::Critical),
    AttackPattern::new(
        "constructor-prototype",
        r#"\x22constructor\x22\s*:\s*\{[^}]{0,80}\x22prototype\x22"#,
        Severity::High,
    ),
    AttackPattern::new("proto-path-segment", r"\b__proto__\b", Severity::High),
];

const XML_ENTITY: &[AttackPattern] = &[
    AttackPattern::new(
        "external-entity-system",
        r"<!ENTITY[^>]{0,200}\bSYSTEM\b",
        Severity::Critical,
    ),
    AttackPattern::new("doctype-internal-subset", r"<!DOCTYPE[^>]{0,200}\[", Severity::High),
    AttackPattern::new(
        "entity-expansion",
        r"<!ENTITY[^>]{0,200}&[a-z]\w{0,30};",
        Severity::High,
    ),
    AttackPattern::new("xinclude-element", r"<\s*xi:include", Severity::High),
];

const XSS: &[AttackPattern] = &[
    AttackPattern::new("script-tag", r"<\s*script\b", Severity::Critical),
    AttackPattern::new(
        "img-onerror",
        r"<\s*img[^>]{0,120}\bonerror\s*=",
        Severity::Critical,
    ),
    AttackPattern::new(
        "event-handler-attribute",
        r"\bon(?:error|load|click|mouseover|mouseenter|focus|blur|submit)\s*=",
        Severity::High,
    ),
    AttackPattern::new("javascript-uri", r"javascript\s*:", Severity::High),
    AttackPattern::new("vbscript-uri", r"vbscript\s*:", Severity::High),
    AttackPattern::new(
        "active-embed-tag",
        r"<\s*(?:iframe|object|embed|applet|form)\b",
        Severity::High,
    ),
];

const SVG: &[AttackPattern] = &[
    AttackPattern::new(
        "svg-event-handler",
        r"<\s*svg[^>]{0,120}\bon\w{1,20}\s*=",
        Severity::Critical,
    ),
    AttackPattern::new("svg-foreign-object", r"<\s*foreignObject\b", Severity::High),
    AttackPattern::new(
        "svg-use-dangerous-href",
        r#"<\s*use[^>]{0,120}\bhref\s*=\s*['\x22]?\s*(?:data|javascript):"#,
        Severity::High,
    ),
];

const SCRIPT: &[AttackPattern] = &[
    AttackPattern::new(
        "node-child-process",
        r#"require\s*\(\s*['\x22]child_process['\x22]"#,
        Severity::Critical,
    ),
    AttackPattern::new(
        "python-os-exec",
        r"\bos\s*\.\s*(?:system|popen|execv?p?e?)\s*\(",
        Severity::Critical,
    ),
    AttackPattern::new(
        "python-subprocess",
        r"\bsubprocess\s*\.\s*(?:call|run|Popen|check_output)\s*\(",
        Severity::Critical,
    ),
    AttackPattern::new("eval-call", r"\beval\s*\(", Severity::High),
    AttackPattern::new("function-constructor", r"new\s+Function\s*\(", Severity::High),
    AttackPattern::new("python-dunder-import", r"__import__\s*\(", Severity::High),
    AttackPattern::new(
        "timer-string-body",
        r#"set(?:Timeout|Interval)\s*\(\s*['\x22]"#,
        Severity::Medium,
    ),
    AttackPattern::new("process-env-read", r"process\s*\.\s*env\b", Severity::Medium),
];

const CSS: &[AttackPattern] = &[
    AttackPattern::new("css-expression", r"expression\s*\(", Severity::High),
    AttackPattern::new(
        "css-script-url",
        r#"url\s*\(\s*['\x22]?\s*(?:javascript|vbscript)\s*:"#,
        Severity::High,
    ),
    AttackPattern::new("moz-binding", r"-moz-binding\s*:", Severity::High),
    AttackPattern::new(
        "css-external-import",
        r#"@import\s+(?:url\s*\()?['\x22]?https?:"#,
        Severity::Medium,
    ),
];

const CRLF: &[AttackPattern] = &[
    AttackPattern::new(
        "response-splitting",
        r"(?:\r\n|\\r\\n)HTTP/1\.[01]",
        Severity::Critical,
    ),
    AttackPattern::new(
        "header-injection",
        r"(?:\r\n|\\r\\n)(?:location|set-cookie|content-type|content-length)\s*:",
        Severity::High,
    ),
];

const CSV: &[AttackPattern] = &[
    AttackPattern::new("dde-command-cell", r"=\s*cmd\s*\|", Severity::Critical),
    AttackPattern::new(
        "formula-function-cell",
        r#"\x22\s*[=+\-@](?:cmd|dde|hyperlink|importxml|importdata|webservice)\b"#,
        Severity::High,
    ),
];

const GRAPHQL: &[AttackPattern] = &[
    AttackPattern::new("introspection-schema", r"__schema\b", Severity::Medium),
    AttackPattern::new("introspection-type", r"__type\s*\(", Severity::Medium),
    AttackPattern::new(
        "deep-selection-nesting",
        r"(?:\{[^{}]{0,40}){12,}",
        Severity::Medium,
    ),
];

const BUFFER_OVERFLOW: &[AttackPattern] = &[
    AttackPattern::new("repeated-fill-bytes", r"(?:A{512,}|(?:%41){64,})", Severity::High),
    AttackPattern::new("format-write-chain", r"(?:%[ns]){4,}", Severity::High),
    AttackPattern::new("nop-sled", r"\x{90}{8,}|(?:\\x90){8,}", Severity::High),
];

const DATA_VALIDATION: &[AttackPattern] = &[
    AttackPattern::new("embedded-null-byte", r"\x00", Severity::Critical),
    AttackPattern::new(
        "format-specifier-chain",
        r"(?:%[diouxXeEfgGp]){6,}",
        Severity::Medium,
    ),
    AttackPattern::new(
        "ansi-escape-sequence",
        r"\x{1B}\[[0-9;]{0,20}[A-Za-z]",
        Severity::Medium,
    ),
];

const SECRETS: &[AttackPattern] = &[
    AttackPattern::new(
        "private-key-block",
        r"-----BEGIN (?:RSA |EC |DSA |OPENSSH |PGP )?PRIVATE KEY-----",
        Severity::High,
    ),
    AttackPattern::cased("aws-access-key-id", r"\bAKIA[0-9A-Z]{16}\b", Severity::High),
    AttackPattern::cased(
        "github-token",
        r"\bgh[pousr]_[A-Za-z0-9]{36}\b",
        Severity::High,
    ),
    AttackPattern::cased(
        "slack-token",
        r"\bxox[baprs]-[A-Za-z0-9-]{10,48}\b",
        Severity::High,
    ),
];

const ENCODING: &[AttackPattern] = &[
    AttackPattern::new(
        "surviving-double-encoding",
        r"%25[0-9a-f]{2}",
        Severity::Medium,
    ),
    AttackPattern::new(
        "surviving-unicode-escape",
        r"\\u00(?:2e|2f|5c|00)",
        Severity::Medium,
    ),
    AttackPattern::new("utf7-angle-bracket", r"\+ADw-|\+AD4-", Severity::Medium),
    AttackPattern::new("punycode-label", r"\bxn--", Severity::Low),
];

/// The shipped detection rounds, most specific / most dangerous first.
pub fn standard_rounds() -> &'static [RoundSpec] {
    &[
        RoundSpec {
            family: "path_traversal",
            violation: ViolationType::PathTraversal,
            confidence: 0.95,
            patterns: PATH_TRAVERSAL,
        },
        RoundSpec {
            family: "ssrf",
            violation: ViolationType::SsrfAttempt,
            confidence: 0.95,
            patterns: SSRF,
        },
        RoundSpec {
            family: "command",
            violation: ViolationType::CommandInjection,
            confidence: 0.9,
            patterns: COMMAND,
        },
        RoundSpec {
            family: "lolbins",
            violation: ViolationType::CommandInjection,
            confidence: 0.85,
            patterns: LOLBINS,
        },
        RoundSpec {
            family: "sql",
            violation: ViolationType::SqlInjection,
            confidence: 0.9,
            patterns: SQL,
        },
        RoundSpec {
            family: "nosql",
            violation: ViolationType::NosqlInjection,
            confidence: 0.85,
            patterns: NOSQL,
        },
        RoundSpec {
            family: "deserialization",
            violation: ViolationType::DeserializationInjection,
            confidence: 0.9,
            patterns: DESERIALIZATION,
        },
        RoundSpec {
            family: "prototype_pollution",
            violation: ViolationType::PrototypePollution,
            confidence: 0.9,
            patterns: PROTOTYPE_POLLUTION,
        },
        RoundSpec {
            family: "xml",
            violation: ViolationType::XmlEntityAttack,
            confidence: 0.9,
            patterns: XML_ENTITY,
        },
        RoundSpec {
            family: "xss",
            violation: ViolationType::XssAttempt,
            confidence: 0.9,
            patterns: XSS,
        },
        RoundSpec {
            family: "svg",
            violation: ViolationType::XssAttempt,
            confidence: 0.85,
            patterns: SVG,
        },
        RoundSpec {
            family: "script",
            violation: ViolationType::ScriptInjection,
            confidence: 0.9,
            patterns: SCRIPT,
        },
        RoundSpec {
            family: "css",
            violation: ViolationType::CssInjection,
            confidence: 0.85,
            patterns: CSS,
        },
        RoundSpec {
            family: "crlf",
            violation: ViolationType::CrlfInjection,
            confidence: 0.85,
            patterns: CRLF,
        },
        RoundSpec {
            family: "csv",
            violation: ViolationType::CsvInjection,
            confidence: 0.8,
            patterns: CSV,
        },
        RoundSpec {
            family: "graphql",
            violation: ViolationType::GraphqlInjection,
            confidence: 0.8,
            patterns: GRAPHQL,
        },
        RoundSpec {
            family: "buffer_overflow",
            violation: ViolationType::BufferOverflowAttempt,
            confidence: 0.8,
            patterns: BUFFER_OVERFLOW,
        },
        RoundSpec {
            family: "data_validation",
            violation: ViolationType::DangerousEncoding,
            confidence: 0.8,
            patterns: DATA_VALIDATION,
        },
        RoundSpec {
            family: "secrets",
            violation: ViolationType::SecretExposure,
            confidence: 0.8,
            patterns: SECRETS,
        },
        RoundSpec {
            family: "encoding",
            violation: ViolationType::SuspiciousEncoding,
            confidence: 0.75,
            patterns: ENCODING,
        },
    ]
}
