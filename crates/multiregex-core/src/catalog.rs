//! 内置规则目录
//!
//! 每个函数返回共享的不可变规则（首次调用时编译）。规则不带扫描状态，
//! 多个引擎、多个会话同时使用同一个实例是安全的。
use std::sync::{Arc, OnceLock};

use crate::rule::Rule;
use crate::ruleset::RuleSet;

/// 域名规则允许的顶级域（固定列表）
const TLDS: &[&str] = &[
    "abogado", "ac", "academy", "accountants", "active", "actor", "ad", "adult", "ae",
    "aero", "af", "ag", "agency", "ai", "airforce", "al", "allfinanz", "alsace", "am",
    "amsterdam", "an", "android", "ao", "aq", "aquarelle", "ar", "archi", "army", "arpa",
    "as", "asia", "associates", "at", "attorney", "au", "auction", "audio", "autos", "aw",
    "ax", "axa", "az", "ba", "band", "bank", "bar", "barclaycard", "barclays", "bargains",
    "bayern", "bb", "bd", "be", "beer", "berlin", "best", "bf", "bg", "bh", "bi", "bid",
    "bike", "bingo", "bio", "biz", "bj", "black", "blackfriday", "bloomberg", "blue", "bm",
    "bmw", "bn", "bnpparibas", "bo", "boo", "boutique", "br", "brussels", "bs", "bt",
    "budapest", "build", "builders", "business", "buzz", "bv", "bw", "by", "bz", "bzh",
    "ca", "cal", "camera", "camp", "cancerresearch", "canon", "capetown", "capital",
    "caravan", "cards", "care", "career", "careers", "cartier", "casa", "cash", "cat",
    "catering", "cc", "cd", "center", "ceo", "cern", "cf", "cg", "ch", "channel", "chat",
    "cheap", "christmas", "chrome", "church", "ci", "citic", "city", "ck", "cl", "claims",
    "cleaning", "click", "clinic", "clothing", "club", "cm", "cn", "co", "coach", "codes",
    "coffee", "college", "cologne", "com", "community", "company", "computer", "condos",
    "construction", "consulting", "contractors", "cooking", "cool", "coop", "country", "cr",
    "credit", "creditcard", "cricket", "crs", "cruises", "cu", "cuisinella", "cv", "cw",
    "cx", "cy", "cymru", "cz", "dabur", "dad", "dance", "dating", "day", "dclk", "de",
    "deals", "degree", "delivery", "democrat", "dental", "dentist", "desi", "design", "dev",
    "diamonds", "diet", "digital", "direct", "directory", "discount", "dj", "dk", "dm",
    "dnp", "do", "docs", "domains", "doosan", "durban", "dvag", "dz", "eat", "ec", "edu",
    "education", "ee", "eg", "email", "emerck", "energy", "engineer", "engineering",
    "enterprises", "equipment", "er", "es", "esq", "estate", "et", "eu", "eurovision",
    "eus", "events", "everbank", "exchange", "expert", "exposed", "fail", "farm", "fashion",
    "feedback", "fi", "finance", "financial", "firmdale", "fish", "fishing", "fit",
    "fitness", "fj", "fk", "flights", "florist", "flowers", "flsmidth", "fly", "fm", "fo",
    "foo", "forsale", "foundation", "fr", "frl", "frogans", "fund", "furniture", "futbol",
    "ga", "gal", "gallery", "garden", "gb", "gbiz", "gd", "ge", "gent", "gf", "gg", "ggee",
    "gh", "gi", "gift", "gifts", "gives", "gl", "glass", "gle", "global", "globo", "gm",
    "gmail", "gmo", "gmx", "gn", "goog", "google", "gop", "gov", "gp", "gq", "gr",
    "graphics", "gratis", "green", "gripe", "gs", "gt", "gu", "guide", "guitars", "guru",
    "gw", "gy", "hamburg", "hangout", "haus", "healthcare", "help", "here", "hermes",
    "hiphop", "hiv", "hk", "hm", "hn", "holdings", "holiday", "homes", "horse", "host",
    "hosting", "house", "how", "hr", "ht", "hu", "ibm", "id", "ie", "ifm", "il", "im",
    "immo", "immobilien", "in", "industries", "info", "ing", "ink", "institute", "insure",
    "int", "international", "investments", "io", "iq", "ir", "irish", "is", "it", "iwc",
    "jcb", "je", "jetzt", "jm", "jo", "jobs", "joburg", "jp", "juegos", "kaufen", "kddi",
    "ke", "kg", "kh", "ki", "kim", "kitchen", "kiwi", "km", "kn", "koeln", "kp", "kr",
    "krd", "kred", "kw", "ky", "kyoto", "kz", "la", "lacaixa", "land", "lat", "latrobe",
    "lawyer", "lb", "lc", "lds", "lease", "legal", "lgbt", "li", "lidl", "life", "lighting",
    "limited", "limo", "link", "lk", "loans", "london", "lotte", "lotto", "lr", "ls", "lt",
    "ltda", "lu", "luxe", "luxury", "lv", "ly", "ma", "madrid", "maison", "management",
    "mango", "market", "marketing", "marriott", "mc", "md", "me", "media", "meet",
    "melbourne", "meme", "memorial", "menu", "mg", "mh", "miami", "mil", "mini", "mk", "ml",
    "mm", "mn", "mo", "mobi", "moda", "moe", "monash", "money", "mormon", "mortgage",
    "moscow", "motorcycles", "mov", "mp", "mq", "mr", "ms", "mt", "mu", "museum", "mv",
    "mw", "mx", "my", "mz", "na", "nagoya", "name", "navy", "nc", "ne", "net", "network",
    "neustar", "new", "nexus", "nf", "ng", "ngo", "nhk", "ni", "ninja", "nl", "no", "np",
    "nr", "nra", "nrw", "ntt", "nu", "nyc", "nz", "okinawa", "om", "one", "ong", "onl",
    "ooo", "org", "organic", "osaka", "otsuka", "ovh", "pa", "paris", "partners", "parts",
    "party", "pe", "pf", "pg", "ph", "pharmacy", "photo", "photography", "photos", "physio",
    "pics", "pictures", "pink", "pizza", "pk", "pl", "place", "plumbing", "pm", "pn",
    "pohl", "poker", "porn", "post", "pr", "praxi", "press", "pro", "prod", "productions",
    "prof", "properties", "property", "ps", "pt", "pub", "pw", "qa", "qpon", "quebec", "re",
    "realtor", "recipes", "red", "rehab", "reise", "reisen", "reit", "ren", "rentals",
    "repair", "report", "republican", "rest", "restaurant", "reviews", "rich", "rio", "rip",
    "ro", "rocks", "rodeo", "rs", "rsvp", "ru", "ruhr", "rw", "ryukyu", "sa", "saarland",
    "sale", "samsung", "sarl", "sb", "sc", "sca", "scb", "schmidt", "schule", "schwarz",
    "science", "scot", "sd", "se", "services", "sew", "sexy", "sg", "sh", "shiksha",
    "shoes", "shriram", "si", "singles", "sj", "sk", "sky", "sl", "sm", "sn", "so",
    "social", "software", "sohu", "solar", "solutions", "soy", "space", "spiegel", "sr",
    "st", "style", "su", "supplies", "supply", "support", "surf", "surgery", "suzuki", "sv",
    "sx", "sy", "sydney", "systems", "sz", "taipei", "tatar", "tattoo", "tax", "tc", "td",
    "technology", "tel", "temasek", "tennis", "tf", "tg", "th", "tienda", "tips", "tires",
    "tirol", "tj", "tk", "tl", "tm", "tn", "to", "today", "tokyo", "tools", "top",
    "toshiba", "town", "toys", "tp", "tr", "trade", "training", "travel", "trust", "tt",
    "tui", "tv", "tw", "tz", "ua", "ug", "uk", "university", "uno", "uol", "us", "uy", "uz",
    "va", "vacations", "vc", "ve", "vegas", "ventures", "versicherung", "vet", "vg", "vi",
    "viajes", "video", "villas", "vision", "vlaanderen", "vn", "vodka", "vote", "voting",
    "voto", "voyage", "vu", "wales", "wang", "watch", "webcam", "website", "wed", "wedding",
    "wf", "whoswho", "wien", "wiki", "williamhill", "wme", "work", "works", "world", "ws",
    "wtc", "wtf", "xyz", "yachts", "yandex", "ye", "yoga", "yokohama", "youtube", "yt",
    "za", "zm", "zone", "zuerich", "zw", "onion"
];

/// 文件名规则允许的扩展名
const FILE_EXTENSIONS: &[&str] = &[
    "docx", "doc", "csv", "pdf", "xlsx", "xls", "rtf", "txt", "pptx", "ppt", "pages", "keynote",
    "numbers", "exe", "dll", "jar", "flv", "swf", "jpeg", "jpg", "gif", "png", "tiff", "bmp",
    "plist", "app", "pkg", "html", "htm", "php", "jsp", "asp", "zip", "zipx", "7z", "rar", "tar",
    "gz",
];

/// URL 规则允许的 scheme
const URL_SCHEMES: &[&str] = &[
    "http", "https", "hxxp", "hxxps", "nntp", "ntp", "rdp", "sftp", "smtp", "ssh", "tor", "webdav",
    "xmpp",
];

/// 目录中所有规则名（`by_name` 可识别的名字）
pub const NAMES: &[&str] = &[
    "email", "bitcoin_address", "md5", "sha1", "sha256", "sha512", "domain", "ipv4", "ipv6", "url",
    "file", "cve", "match_all",
];

macro_rules! builtin {
    ($(#[$doc:meta])* $name:ident, $pattern:expr) => {
        $(#[$doc])*
        pub fn $name() -> Arc<Rule> {
            static CELL: OnceLock<Arc<Rule>> = OnceLock::new();
            Arc::clone(CELL.get_or_init(|| compile(stringify!($name), &$pattern)))
        }
    };
}

fn compile(id: &str, pattern: &str) -> Arc<Rule> {
    match Rule::named(id, pattern) {
        Ok(rule) => Arc::new(rule),
        Err(e) => panic!("builtin rule `{id}` does not compile: {e}"),
    }
}

builtin!(
    /// 邮箱（含 `[at]`、`(@)` 等混淆写法）
    email,
    r"[A-Za-z0-9_.]+(( ?(\[|\()? ?@ ?(\)|\])? ?)|( ?(\[|\() ?[aA][tT] ?(\)|\]) ?))[0-9a-z.-]+"
);
builtin!(
    /// 比特币地址
    bitcoin_address,
    r#"(?:^|[ '":])((bc1|[13])[a-zA-HJ-NP-Z0-9]{25,39})"#
);
builtin!(md5, hex_digest(32));
builtin!(sha1, hex_digest(40));
builtin!(sha256, hex_digest(64));
builtin!(sha512, hex_digest(128));
builtin!(
    /// 以固定顶级域列表结尾的域名，允许 `[.]` / `(.)` 混淆
    domain,
    format!(
        r"([A-Za-z0-9-]+([\[\(]?\.[\]\)]?[A-Za-z0-9-]+)*[\[\(]?\.[\]\)]?({})(?-u:\b))",
        TLDS.join("|")
    )
);
builtin!(
    ipv4,
    r"(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)([\[\(]?\.[\]\)]?)){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)"
);
builtin!(ipv6, r"(?:[a-f0-9]{1,4}:|:){2,7}(?:[a-f0-9]{1,4}|:)");
builtin!(
    url,
    format!(r"((?-u:\b)(({})://[^\s]+)(?-u:\b))", URL_SCHEMES.join("|"))
);
builtin!(
    file,
    format!(r"(([A-Za-z0-9_\-]+)\.)+({})", FILE_EXTENSIONS.join("|"))
);
builtin!(
    /// `CVE-YYYY-NNNN+`
    cve,
    r"(CVE-\d{4}-\d{4,7})"
);
builtin!(
    /// 匹配任意输入（包括空输入）
    match_all,
    r".*"
);

fn hex_digest(len: usize) -> String {
    format!(r"(?-u:\b)[A-Fa-f0-9]{{{len}}}(?-u:\b)")
}

/// 默认规则集：邮箱、域名、URL
pub fn default_rules() -> RuleSet {
    [email(), domain(), url()].into_iter().collect()
}

/// 按名字取内置规则
pub fn by_name(name: &str) -> Option<Arc<Rule>> {
    let rule = match name {
        "email" => email(),
        "bitcoin_address" => bitcoin_address(),
        "md5" => md5(),
        "sha1" => sha1(),
        "sha256" => sha256(),
        "sha512" => sha512(),
        "domain" => domain(),
        "ipv4" => ipv4(),
        "ipv6" => ipv6(),
        "url" => url(),
        "file" => file(),
        "cve" => cve(),
        "match_all" => match_all(),
        _ => return None,
    };
    Some(rule)
}
