//! Enumerated field values shared by the API and the database.
//!
//! Every choice keeps the code the deployed clients already send (`hazirlaniyor`,
//! `toplama`, ...) and a human readable label used for the `*_display` fields.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $code:literal, $label:literal;)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $code)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self { $($name::$variant => $code),+ }
            }

            pub fn label(self) -> &'static str {
                match self { $($name::$variant => $label),+ }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                Self::parse(raw).ok_or_else(|| {
                    FromSqlError::Other(format!("unknown {} value: {}", stringify!($name), raw).into())
                })
            }
        }
    };
}

choice_enum! {
    /// Lifecycle of a cargo record.
    CargoStatus {
        Preparing => "hazirlaniyor", "Hazırlanıyor";
        InTransit => "yolda", "Yolda";
        Delivered => "teslim_edildi", "Teslim Edildi";
        Cancelled => "iptal_edildi", "İptal Edildi";
    }
}

choice_enum! {
    CargoType {
        Food => "gida", "Gıda";
        Medicine => "ilac", "İlaç";
        Clothing => "giyim", "Giyim";
        Mixed => "karisik", "Karışık";
        Other => "diger", "Diğer";
    }
}

choice_enum! {
    /// Which assignments a volunteer may take. `Mixed` covers every role.
    VolunteerRole {
        Collection => "toplama", "Toplama Gönüllüsü";
        Transport => "tasima", "Taşıma Gönüllüsü";
        Distribution => "dagitim", "Dağıtım Gönüllüsü";
        Mixed => "karma", "Karma Gönüllü (Tüm Görevler)";
    }
}

choice_enum! {
    ContactCategory {
        General => "genel", "Genel Bilgi";
        Volunteering => "gonulluluk", "Gönüllülük";
        AidRequest => "yardim", "Yardım Talebi";
        Donation => "bagis", "Bağış";
        Technical => "teknik", "Teknik Destek";
        Media => "medya", "Medya ve Basın";
        Partnership => "isbirligi", "İş Birliği";
        Complaint => "sikayet", "Şikayet ve Öneri";
    }
}

choice_enum! {
    ContactStatus {
        New => "yeni", "Yeni";
        Read => "okundu", "Okundu";
        InProgress => "cevaplanıyor", "Cevaplanıyor";
        Answered => "cevaplandi", "Cevaplandı";
        Closed => "kapandi", "Kapatıldı";
    }
}

choice_enum! {
    ContactPriority {
        Low => "dusuk", "Düşük";
        Normal => "normal", "Normal";
        High => "yuksek", "Yüksek";
        Urgent => "acil", "Acil";
    }
}

impl VolunteerRole {
    /// Whether a volunteer of this role may be assigned to `slot`.
    pub fn can_fill(self, slot: VolunteerRole) -> bool {
        self == VolunteerRole::Mixed || self == slot
    }
}

/// One of the 81 provinces, identified by its ASCII code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct City(&'static CityInfo);

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CityInfo {
    pub code: &'static str,
    pub name: &'static str,
}

impl City {
    pub fn parse(code: &str) -> Option<City> {
        CITIES.iter().find(|c| c.code == code).map(City)
    }

    pub fn code(self) -> &'static str {
        self.0.code
    }

    pub fn name(self) -> &'static str {
        self.0.name
    }

    /// Approximate centre coordinates, known for the larger provinces only.
    pub fn coordinates(self) -> Option<(f64, f64)> {
        CITY_COORDINATES
            .iter()
            .find(|(code, _, _)| *code == self.0.code)
            .map(|(_, lat, lon)| (*lat, *lon))
    }
}

/// Display name for a stored city code, falling back to the code itself.
pub fn city_display(code: &str) -> String {
    City::parse(code).map(|c| c.name().to_string()).unwrap_or_else(|| code.to_string())
}

/// Great-circle distance in km between two cities, when both have coordinates.
pub fn route_distance_km(from: &str, to: &str) -> Option<f64> {
    let (lat1, lon1) = City::parse(from)?.coordinates()?;
    let (lat2, lon2) = City::parse(to)?.coordinates()?;

    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    Some(round2(6371.0 * c))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

macro_rules! cities {
    ($($code:literal => $name:literal),+ $(,)?) => {
        pub static CITIES: &[CityInfo] = &[$(CityInfo { code: $code, name: $name }),+];
    };
}

cities! {
    "adana" => "Adana", "adiyaman" => "Adıyaman", "afyonkarahisar" => "Afyonkarahisar",
    "agri" => "Ağrı", "aksaray" => "Aksaray", "amasya" => "Amasya", "ankara" => "Ankara",
    "antalya" => "Antalya", "ardahan" => "Ardahan", "artvin" => "Artvin", "aydin" => "Aydın",
    "balikesir" => "Balıkesir", "bartin" => "Bartın", "batman" => "Batman", "bayburt" => "Bayburt",
    "bilecik" => "Bilecik", "bingol" => "Bingöl", "bitlis" => "Bitlis", "bolu" => "Bolu",
    "burdur" => "Burdur", "bursa" => "Bursa", "canakkale" => "Çanakkale", "cankiri" => "Çankırı",
    "corum" => "Çorum", "denizli" => "Denizli", "diyarbakir" => "Diyarbakır", "duzce" => "Düzce",
    "edirne" => "Edirne", "elazig" => "Elazığ", "erzincan" => "Erzincan", "erzurum" => "Erzurum",
    "eskisehir" => "Eskişehir", "gaziantep" => "Gaziantep", "giresun" => "Giresun",
    "gumushane" => "Gümüşhane", "hakkari" => "Hakkâri", "hatay" => "Hatay", "igdir" => "Iğdır",
    "isparta" => "Isparta", "istanbul" => "İstanbul", "izmir" => "İzmir",
    "kahramanmaras" => "Kahramanmaraş", "karabuk" => "Karabük", "karaman" => "Karaman",
    "kars" => "Kars", "kastamonu" => "Kastamonu", "kayseri" => "Kayseri", "kilis" => "Kilis",
    "kirikkale" => "Kırıkkale", "kirklareli" => "Kırklareli", "kirsehir" => "Kırşehir",
    "kocaeli" => "Kocaeli", "konya" => "Konya", "kutahya" => "Kütahya", "malatya" => "Malatya",
    "manisa" => "Manisa", "mardin" => "Mardin", "mersin" => "Mersin", "mugla" => "Muğla",
    "mus" => "Muş", "nevsehir" => "Nevşehir", "nigde" => "Niğde", "ordu" => "Ordu",
    "osmaniye" => "Osmaniye", "rize" => "Rize", "sakarya" => "Sakarya", "samsun" => "Samsun",
    "sanliurfa" => "Şanlıurfa", "siirt" => "Siirt", "sinop" => "Sinop", "sirnak" => "Şırnak",
    "sivas" => "Sivas", "tekirdag" => "Tekirdağ", "tokat" => "Tokat", "trabzon" => "Trabzon",
    "tunceli" => "Tunceli", "usak" => "Uşak", "van" => "Van", "yalova" => "Yalova",
    "yozgat" => "Yozgat", "zonguldak" => "Zonguldak",
}

static CITY_COORDINATES: &[(&str, f64, f64)] = &[
    ("istanbul", 41.0082, 28.9784),
    ("ankara", 39.9334, 32.8597),
    ("izmir", 38.4192, 27.1287),
    ("bursa", 40.1826, 29.0665),
    ("antalya", 36.8969, 30.7133),
    ("adana", 37.0000, 35.3213),
    ("gaziantep", 37.0662, 37.3833),
    ("konya", 37.8667, 32.4833),
    ("mersin", 36.8000, 34.6333),
    ("diyarbakir", 37.9144, 40.2306),
    ("kayseri", 38.7312, 35.4787),
    ("eskisehir", 39.7767, 30.5206),
    ("sanliurfa", 37.1591, 38.7969),
    ("malatya", 38.3552, 38.3095),
    ("erzurum", 39.9000, 41.2700),
    ("van", 38.4891, 43.4089),
    ("batman", 37.8812, 41.1351),
    ("elazig", 38.6810, 39.2264),
    ("erzincan", 39.7500, 39.5000),
    ("tokat", 40.3167, 36.5500),
    ("sivas", 39.7477, 37.0179),
    ("rize", 41.0201, 40.5234),
    ("ordu", 40.9839, 37.8764),
    ("giresun", 40.9128, 38.3895),
    ("trabzon", 41.0015, 39.7178),
    ("samsun", 41.2928, 36.3313),
    ("sinop", 42.0231, 35.1531),
    ("zonguldak", 41.4564, 31.7987),
    ("karabuk", 41.2061, 32.6204),
    ("kastamonu", 41.3887, 33.7827),
    ("corum", 40.5506, 34.9556),
    ("amasya", 40.6499, 35.8353),
];

/// Suggested content lines per cargo type, used by the content picker.
pub fn content_suggestions(kind: CargoType) -> &'static [&'static str] {
    match kind {
        CargoType::Food => &[
            "Su (5L, 10L, 19L)", "Konserve Gıda (Et, Sebze, Meyve)", "Kuru Gıda Paketi",
            "Bebek Maması ve Besini", "Taze Meyve ve Sebze", "Ekmek ve Unlu Mamuller",
            "Pirinç (1kg, 5kg, 25kg)", "Makarna ve Bulgur", "Bakliyat (Mercimek, Fasulye, Nohut)",
            "Yağ ve Tereyağı", "Süt ve Süt Ürünleri", "Hazır Yemek Paketi",
            "Çay ve Kahve", "Şeker ve Bal", "Tuz ve Baharat",
            "Bisküvi ve Kraker", "Kuruyemiş ve Çekirdek", "Reçel ve Pekmez",
            "Çikolata ve Şeker", "Mama Biberon ve Emzik",
        ],
        CargoType::Medicine => &[
            "Reçeteli İlaç Paketi", "Ağrı Kesici (Parol, Aspirin)", "Ateş Düşürücü",
            "Soğuk Algınlığı İlacı", "Vitamin ve Mineral Takviyesi", "İlk Yardım Çantası",
            "Bandaj ve Sargı Malzemesi", "Antiseptik ve Dezenfektan", "Termometre",
            "Kan Basıncı Aleti", "Diyabet Test Kiti", "Maske ve Eldiven",
            "Serum Fizyolojik", "Pamuk ve Gazlı Bez", "Yara Bandı ve Flaster",
            "Öksürük Şurubu", "Mide İlacı", "Göz Damlası",
            "Kulak Damlası", "Merhem ve Krem", "Enjektör ve İğne",
            "Tansiyon İlacı", "Kalp İlacı", "Nefes Açıcı (Astım)",
            "İnsülin ve Diyabet Malzemeleri",
        ],
        CargoType::Clothing => &[
            "Yetişkin Kış Kıyafeti", "Yetişkin Yaz Kıyafeti", "Çocuk Kıyafeti (0-2 Yaş)",
            "Çocuk Kıyafeti (3-12 Yaş)", "Genç Kıyafeti (13-18 Yaş)", "Ayakkabı (Erkek/Kadın/Çocuk)",
            "İç Çamaşırı Seti", "Battaniye ve Yorgan", "Uyku Tulumu",
            "Yastık ve Kılıf", "Çadır ve Kamp Malzemesi", "Mont ve Kaban",
            "Çorap ve Külotlu Çorap", "Eldiven ve Bere", "Atkı ve Şal",
            "Pijama ve Gecelik", "Hamile Kıyafeti", "Bebek Kıyafeti ve Zıbın",
            "İş Kıyafeti ve Önlük", "Spor Kıyafeti", "Terlik ve Sandalet",
            "Çizme ve Bot", "Kemer ve Aksesuar",
        ],
        CargoType::Mixed => &[
            "Aile Yardım Paketi", "Acil Durum Paketi", "Bebek Bakım Paketi",
            "Okul Malzemeleri Paketi", "Hijyen Paketi", "Temizlik Malzemeleri Paketi",
            "Kışlık Hazırlık Paketi", "Yenidoğan Paketi", "Yaşlı Bakım Paketi",
            "Engelli Bakım Paketi", "Kadın Hijyen Paketi", "Erkek Bakım Paketi",
            "Çocuk Oyun Paketi", "Eğitim Destek Paketi", "Mutfak Eşyası Paketi",
            "Banyo Malzemeleri Paketi", "Kamp ve Barınma Paketi", "İletişim Paketi",
        ],
        CargoType::Other => &[
            "Elektronik Eşya (Telefon, Tablet)", "Ev Eşyası (Tencere, Tabak)", "Eğitim Malzemeleri",
            "Kitap ve Dergi", "Çocuk Oyuncakları", "Spor Malzemeleri",
            "Müzik Aletleri", "Bahçe ve Tarım Malzemeleri", "İnşaat Malzemeleri",
            "Araç Yedek Parça", "Yakıt ve Enerji", "Haberleşme Cihazları",
            "Temizlik Malzemeleri", "Kırtasiye Malzemeleri", "Mobilya ve Dekorasyon",
            "Mutfak Gereçleri", "Banyo Malzemeleri", "Aydınlatma Malzemeleri",
            "Güvenlik Malzemeleri", "Yangın Söndürme Malzemeleri", "Jeneratör ve Güç Kaynağı",
            "Su Arıtma Cihazları", "Isıtma ve Soğutma Cihazları", "Çanta ve Bavul",
            "Saatler ve Takılar", "Optik Malzemeler (Gözlük)", "Pet Malzemeleri",
            "Hobi Malzemeleri", "Sanat Malzemeleri", "Fotoğraf ve Video Ekipmanları",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_provinces_present() {
        assert_eq!(CITIES.len(), 81);
        assert_eq!(City::parse("istanbul").map(City::name), Some("İstanbul"));
        assert!(City::parse("Istanbul").is_none());
    }

    #[test]
    fn mixed_role_fills_every_slot() {
        for slot in [VolunteerRole::Collection, VolunteerRole::Transport, VolunteerRole::Distribution] {
            assert!(VolunteerRole::Mixed.can_fill(slot));
            assert!(slot.can_fill(slot));
        }
        assert!(!VolunteerRole::Distribution.can_fill(VolunteerRole::Collection));
    }

    #[test]
    fn route_distance_needs_both_coordinates() {
        let d = route_distance_km("istanbul", "ankara").expect("both known");
        assert!(d > 340.0 && d < 360.0, "got {d}");
        assert_eq!(route_distance_km("istanbul", "kilis"), None);
    }

    #[test]
    fn status_codes_round_trip_through_parse() {
        for status in CargoStatus::ALL {
            assert_eq!(CargoStatus::parse(status.as_str()), Some(*status));
        }
        assert_eq!(serde_json::to_string(&CargoStatus::InTransit).unwrap(), "\"yolda\"");
    }
}
